//! Grouping flagged intervals into events

use crate::core::{AnomalyEvent, EventContext, SpikeEvent};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Slack on the nominal interval when deciding two flagged readings are adjacent
const GROUPING_TOLERANCE: f64 = 0.1;

/// Events that belong to a channel and start at an instant
pub trait ChannelEvent {
    fn channel_id(&self) -> &str;

    fn start(&self) -> NaiveDateTime;
}

impl ChannelEvent for AnomalyEvent {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn start(&self) -> NaiveDateTime {
        self.start
    }
}

impl ChannelEvent for SpikeEvent {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn start(&self) -> NaiveDateTime {
        self.start
    }
}

/// Largest step between two flagged readings of one event
pub fn max_gap_seconds(resolution_seconds: i64, max_gap_intervals: f64) -> f64 {
    resolution_seconds as f64 * max_gap_intervals * (1.0 + GROUPING_TOLERANCE)
}

/// Split time-ordered items into runs whose neighbours are at most
/// `max_gap_seconds` apart
pub fn group_consecutive<T, F>(items: Vec<T>, timestamp: F, max_gap_seconds: f64) -> Vec<Vec<T>>
where
    F: Fn(&T) -> NaiveDateTime,
{
    let mut runs: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();

    for item in items {
        if let Some(last) = current.last() {
            let step = (timestamp(&item) - timestamp(last)).num_seconds() as f64;
            if step > max_gap_seconds {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(item);
    }

    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Majority vote over a run; an exact tie counts as business hours
pub fn classify_context(business_hours_flags: impl IntoIterator<Item = bool>) -> EventContext {
    let (business, total) = business_hours_flags
        .into_iter()
        .fold((0usize, 0usize), |(business, total), flag| {
            (business + usize::from(flag), total + 1)
        });

    if total > 0 && business * 2 >= total {
        EventContext::BusinessHours
    } else {
        EventContext::AfterHours
    }
}

/// Sort events by start time, then channel id
pub fn sort_chronologically<E: ChannelEvent>(events: &mut [E]) {
    events.sort_by(|a, b| {
        a.start()
            .cmp(&b.start())
            .then_with(|| a.channel_id().cmp(b.channel_id()))
    });
}

/// Index events by channel, preserving their order within each channel
pub fn by_channel<E: ChannelEvent>(events: &[E]) -> BTreeMap<&str, Vec<&E>> {
    let mut index: BTreeMap<&str, Vec<&E>> = BTreeMap::new();
    for event in events {
        index.entry(event.channel_id()).or_default().push(event);
    }
    index
}
