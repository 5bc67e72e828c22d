use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::AppResult;
use crate::messages::{self, Transition};
use crate::models::{CalendarEntry, LiveEvent};
use crate::services::{BroadcastGateway, CalendarGateway, LinkPublisher, TimeWindow};

/// Reconciliation engine: compares a batch of live events against a
/// pass-scoped calendar snapshot and issues create/update/delete calls plus
/// broadcast notifications for state transitions.
///
/// A pass is sequential and single-writer: the snapshot is fetched once, held
/// read-only, and never re-read after a mutation. One event's gateway failure
/// never stops the rest of the batch.
pub struct Reconciler {
    calendar: Arc<dyn CalendarGateway>,
    broadcast: Arc<dyn BroadcastGateway>,
    links: Arc<dyn LinkPublisher>,
    config: SyncConfig,
}

impl Reconciler {
    pub fn new(
        calendar: Arc<dyn CalendarGateway>,
        broadcast: Arc<dyn BroadcastGateway>,
        links: Arc<dyn LinkPublisher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            calendar,
            broadcast,
            links,
            config,
        }
    }

    /// Run one full reconciliation pass over `live_events` as of `now`.
    /// `now` is supplied by the driver so that a pass is a pure function of
    /// its inputs plus gateway state.
    pub async fn run_pass(&self, live_events: &[LiveEvent], now: DateTime<Utc>) -> AppResult<()> {
        info!(
            "Starting reconciliation pass over {} live events",
            live_events.len()
        );

        let window = TimeWindow {
            min: now - Duration::days(self.config.past_days),
            max: now + Duration::days(self.config.future_days),
        };
        let entries = match self.calendar.list_entries(window).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to fetch calendar snapshot, skipping pass: {:?}", e);
                return Ok(());
            }
        };
        debug!("Fetched {} calendar entries", entries.len());

        let index = index_by_video_id(&entries);

        for event in live_events {
            match index.get(event.id.as_str()) {
                Some(entry) => self.reconcile_existing(event, entry, now).await,
                None => self.create_missing(event, now).await,
            }
        }

        self.suppress_duplicates(live_events, &entries).await;

        Ok(())
    }

    /// Creation path: no calendar entry exists for this live event yet.
    /// Events announced beyond the snapshot horizon are deliberately ignored
    /// to keep the calendar and the notification channel quiet.
    async fn create_missing(&self, event: &LiveEvent, now: DateTime<Utc>) {
        if event.scheduled_start_time > now + Duration::days(self.config.future_days) {
            info!(
                "[{}]: {} was not scheduled, it is more than {} days away",
                event.id,
                event.canonical_title(),
                self.config.future_days
            );
            return;
        }

        if let Err(e) = self.calendar.create_entry(event).await {
            warn!("[{}]: failed to create calendar entry: {:?}", event.id, e);
            return;
        }
        info!("[{}]: scheduled {}", event.id, event.canonical_title());

        let link = self.publish_link(event).await;
        self.send(event, messages::render(Transition::Created, event, link.as_deref()))
            .await;
    }

    /// Update path: an entry exists; evaluate the triggers in fixed order.
    /// Every firing trigger issues an (idempotent) update; `should_notify`
    /// accumulates so a quiet pass can be logged as such.
    async fn reconcile_existing(
        &self,
        event: &LiveEvent,
        entry: &CalendarEntry,
        now: DateTime<Utc>,
    ) {
        let mut should_notify = false;

        // Title drift. The entry is rewritten, but the broadcast for
        // title-only changes is disabled; the rendered text stays in the
        // debug log.
        let title = event.canonical_title();
        if title != entry.title {
            should_notify = true;
            if !self.try_update(entry, event).await {
                return;
            }
            debug!(
                "[{}]: broadcast disabled for title change: {}",
                event.id,
                messages::render(Transition::TitleChanged, event, None)
            );
        }

        // Start drift: an observed actual start takes precedence over the
        // announced schedule; the two checks are mutually exclusive.
        if let Some(actual_start) = event.actual_start_time {
            if actual_start != entry.start_time {
                should_notify = true;
                if !self.try_update(entry, event).await {
                    return;
                }
                if entry.actual_start_time.is_none() {
                    self.send(event, messages::render(Transition::Started, event, None))
                        .await;
                } else {
                    debug!(
                        "[{}]: start already recorded, skipping start notification",
                        event.id
                    );
                }
            }
        } else if event.scheduled_start_time != entry.start_time {
            should_notify = true;
            if !self.try_update(entry, event).await {
                return;
            }
            let link = self.publish_link(event).await;
            self.send(
                event,
                messages::render(Transition::Rescheduled, event, link.as_deref()),
            )
            .await;
        }

        // Starting-soon alert. Time-based only, no calendar write; re-fires
        // on every pass while the window is open.
        let until_start = event.scheduled_start_time - now;
        if until_start > Duration::zero()
            && until_start <= Duration::seconds(self.config.imminent_window_seconds)
        {
            should_notify = true;
            self.send(event, messages::render(Transition::Imminent, event, None))
                .await;
        }

        // End observed.
        if let Some(actual_end) = event.actual_end_time {
            if actual_end != entry.end_time {
                should_notify = true;
                if !self.try_update(entry, event).await {
                    return;
                }
                if entry.actual_end_time.is_none() {
                    self.send(event, messages::render(Transition::Ended, event, None))
                        .await;
                } else {
                    debug!(
                        "[{}]: end already recorded, skipping end notification",
                        event.id
                    );
                }
            }
        }

        if !should_notify {
            info!("[{}]: {} is already scheduled", event.id, event.title);
        }
    }

    /// Remove collaboration-labeled entries that duplicate a member's solo
    /// stream at the exact same announced start time. Exact timestamp
    /// equality is the sole correlation key.
    pub async fn suppress_duplicates(
        &self,
        live_events: &[LiveEvent],
        entries: &[CalendarEntry],
    ) {
        for member in &self.config.members {
            for event in live_events {
                if !event.is_solo() || event.actor != *member {
                    continue;
                }
                for entry in entries {
                    if !collaboration_lists_member(&entry.title, member) {
                        continue;
                    }
                    if entry.scheduled_start_time != Some(event.scheduled_start_time) {
                        continue;
                    }
                    match self.calendar.delete_entry(&entry.id).await {
                        Ok(()) => info!(
                            "[{}] deleted, duplicate of {}'s solo stream: {}",
                            entry.id, member, entry.title
                        ),
                        Err(e) => warn!(
                            "[{}]: failed to delete duplicate entry: {:?}",
                            entry.id, e
                        ),
                    }
                }
            }
        }
    }

    async fn try_update(&self, entry: &CalendarEntry, event: &LiveEvent) -> bool {
        match self.calendar.update_entry(&entry.id, event).await {
            Ok(_) => {
                info!("[{}]: updated calendar entry {}", event.id, entry.id);
                true
            }
            Err(e) => {
                warn!(
                    "[{}]: failed to update calendar entry {}: {:?}",
                    event.id, entry.id, e
                );
                false
            }
        }
    }

    async fn publish_link(&self, event: &LiveEvent) -> Option<String> {
        match self.links.publish(event).await {
            Ok(url) => {
                info!("[{}]: published calendar file link: {}", event.id, url);
                Some(url)
            }
            Err(e) => {
                warn!(
                    "[{}]: failed to publish calendar file link: {:?}",
                    event.id, e
                );
                None
            }
        }
    }

    async fn send(&self, event: &LiveEvent, text: String) {
        match self.broadcast.broadcast(&text).await {
            Ok(()) => info!("[{}]: pushed notification to channel: {}", event.id, text),
            Err(e) => warn!("[{}]: failed to broadcast notification: {:?}", event.id, e),
        }
    }
}

/// Build the pass-scoped `video_id -> entry` index. Entries are expected to
/// be unique per video id; when they are not, the entry with the lowest
/// calendar id wins deterministically and a warning is logged.
fn index_by_video_id(entries: &[CalendarEntry]) -> HashMap<&str, &CalendarEntry> {
    let mut index: HashMap<&str, &CalendarEntry> = HashMap::new();
    for entry in entries {
        match index.entry(entry.video_id.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                if entry.id < slot.get().id {
                    slot.insert(entry);
                }
                warn!(
                    "Multiple calendar entries share video_id {}, keeping entry {}",
                    entry.video_id,
                    slot.get().id
                );
            }
        }
    }
    index
}

fn collab_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\[(?P<names>[^\]]+) コラボ\]").expect("valid pattern"))
}

/// Two-stage duplicate predicate: the title must carry a collaboration
/// prefix, and the member must appear in it as a whole delimited name, so
/// one member's name being a substring of another's cannot match.
fn collaboration_lists_member(title: &str, member: &str) -> bool {
    let Some(caps) = collab_pattern().captures(title) else {
        return false;
    };
    caps["names"].split(',').any(|name| name.trim() == member)
}
