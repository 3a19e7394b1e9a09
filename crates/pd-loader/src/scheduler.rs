//! Deferred work: the engine's task queue and per-frame scheduled navigations.
//!
//! Time is virtual. Tasks posted with a delay become due once
//! [`Engine::advance_time`] moves the clock past them; zero-delay tasks run on
//! the next [`Engine::run_pending_tasks`].

use crate::engine::Engine;
use crate::form_submission::FormSubmission;
use crate::ids::FrameId;
use crate::load_request::FrameLoadRequest;
use crate::load_request::OriginDocument;
use crate::types::ClientRedirectPolicy;
use log::debug;
use log::trace;
use pd_net::CachePolicy;
use pd_net::ResourceRequest;
use pd_net::url::equal_ignoring_fragment;
use pd_net::url::has_fragment_identifier;
use pd_net::url::is_about_blank;
use pd_net::url::protocol_is_javascript;
use url::Url;

/// Longest accepted refresh delay, in seconds.
const MAX_REDIRECT_DELAY_SECONDS: f64 = (i32::MAX / 1000) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    CheckCompleted(FrameId),
    DidAccessInitialDocument(FrameId),
    NavigationTimer(FrameId),
}

#[derive(Debug, Clone)]
struct PendingTask {
    id: TaskId,
    due_ms: u64,
    task: Task,
}

#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    now_ms: u64,
    next_id: u64,
    pending: Vec<PendingTask>,
}

impl TaskQueue {
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn post(&mut self, delay_ms: u64, task: Task) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        self.pending.push(PendingTask {
            id,
            due_ms: self.now_ms.saturating_add(delay_ms),
            task,
        });
        id
    }

    /// Returns false when the task already ran or was cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.id != id);
        self.pending.len() != before
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.pending.iter().any(|pending| pending.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.pending.iter().map(|pending| pending.due_ms).min()
    }

    /// Earliest due task, ties broken by posting order.
    pub(crate) fn take_due(&mut self) -> Option<(TaskId, Task)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, pending)| pending.due_ms <= self.now_ms)
            .min_by_key(|(_, pending)| (pending.due_ms, pending.id))
            .map(|(index, _)| index)?;
        let pending = self.pending.remove(index);
        Some((pending.id, pending.task))
    }

    pub(crate) fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledNavigationKind {
    /// `Refresh` header or `<meta http-equiv=refresh>`.
    Redirect {
        origin: Option<OriginDocument>,
        url: Url,
    },
    LocationChange {
        origin: OriginDocument,
        url: Url,
        referrer: Option<String>,
    },
    Refresh {
        origin: OriginDocument,
        url: Url,
        referrer: Option<String>,
    },
    HistoryNavigation {
        steps: isize,
    },
    FormSubmission(Box<FormSubmission>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledNavigation {
    pub delay_seconds: f64,
    pub lock_back_forward_list: bool,
    pub user_gesture: bool,
    pub kind: ScheduledNavigationKind,
}

impl ScheduledNavigation {
    pub fn is_location_change(&self) -> bool {
        !matches!(self.kind, ScheduledNavigationKind::Redirect { .. })
    }

    pub fn is_form(&self) -> bool {
        matches!(self.kind, ScheduledNavigationKind::FormSubmission(_))
    }

    fn delay_ms(&self) -> u64 {
        (self.delay_seconds * 1000.0).round() as u64
    }
}

/// At most one pending navigation per frame; scheduling replaces it.
#[derive(Debug, Clone, Default)]
pub struct NavigationScheduler {
    pub(crate) redirect: Option<ScheduledNavigation>,
    pub(crate) timer: Option<TaskId>,
}

impl NavigationScheduler {
    pub fn scheduled(&self) -> Option<&ScheduledNavigation> {
        self.redirect.as_ref()
    }

    pub fn is_timer_active(&self) -> bool {
        self.timer.is_some()
    }

    pub fn location_change_pending(&self) -> bool {
        self.redirect
            .as_ref()
            .is_some_and(ScheduledNavigation::is_location_change)
    }
}

impl Engine {
    /// Runs every task that is due at the current virtual time.
    pub fn run_pending_tasks(&mut self) {
        while let Some((id, task)) = self.tasks.take_due() {
            trace!("running {task:?}");
            match task {
                Task::CheckCompleted(frame) => self.check_timer_fired(frame, id),
                Task::DidAccessInitialDocument(frame) => self.did_access_initial_document_timer_fired(frame, id),
                Task::NavigationTimer(frame) => self.navigation_timer_fired(frame, id),
            }
        }
    }

    /// Moves the virtual clock forward, running tasks in due order as it goes.
    pub fn advance_time(&mut self, delta_ms: u64) {
        let target = self.tasks.now_ms().saturating_add(delta_ms);
        self.run_pending_tasks();
        while let Some(due) = self.tasks.next_due_ms().filter(|due| *due <= target) {
            self.tasks.advance_to(due);
            self.run_pending_tasks();
        }
        self.tasks.advance_to(target);
        self.run_pending_tasks();
    }

    fn should_schedule_navigation(&self, frame: FrameId, url: Option<&Url>) -> bool {
        if !self.is_alive(frame) {
            return false;
        }
        url.is_some_and(protocol_is_javascript) || self.navigation_disable_count == 0
    }

    /// Schedules a client redirect after `delay_seconds`; a pending redirect with a shorter delay wins.
    pub fn schedule_redirect(&mut self, frame: FrameId, delay_seconds: f64, url: Url) {
        if !self.should_schedule_navigation(frame, Some(&url)) {
            return;
        }
        if !(0.0..=MAX_REDIRECT_DELAY_SECONDS).contains(&delay_seconds) {
            return;
        }
        let existing_delay = self
            .frame_ref(frame)
            .and_then(|state| state.scheduler.redirect.as_ref())
            .map(|redirect| redirect.delay_seconds);
        if existing_delay.is_some_and(|existing| delay_seconds > existing) {
            return;
        }

        let origin = self
            .document(frame)
            .map(|document| OriginDocument::capture(frame, document));
        self.schedule_navigation(
            frame,
            ScheduledNavigation {
                delay_seconds,
                lock_back_forward_list: delay_seconds <= 1.0,
                user_gesture: false,
                kind: ScheduledNavigationKind::Redirect { origin, url },
            },
        );
    }

    /// Script-initiated navigation (`location.href = ...`).
    ///
    /// Same-origin fragment changes load immediately; everything else waits for the next task.
    pub fn schedule_location_change(
        &mut self,
        frame: FrameId,
        origin: OriginDocument,
        url: Url,
        referrer: Option<String>,
        lock_back_forward_list: bool,
        user_gesture: bool,
    ) {
        if !self.should_schedule_navigation(frame, Some(&url)) {
            return;
        }
        let lock_back_forward_list =
            lock_back_forward_list || self.must_lock_back_forward_list(frame, user_gesture);

        let fragment_only = self.document(frame).is_some_and(|document| {
            origin.security_origin.can_access(&document.security_origin)
                && has_fragment_identifier(&url)
                && equal_ignoring_fragment(&document.url, &url)
        });
        if fragment_only {
            let mut request = FrameLoadRequest::new(
                Some(origin),
                ResourceRequest::with_referrer(url, referrer.as_deref()),
            )
            .with_frame_name("_self");
            request.lock_back_forward_list = lock_back_forward_list;
            request.user_gesture = user_gesture;
            if lock_back_forward_list {
                request.client_redirect = ClientRedirectPolicy::ClientRedirect;
            }
            self.load(frame, request);
            return;
        }

        self.schedule_navigation(
            frame,
            ScheduledNavigation {
                delay_seconds: 0.0,
                lock_back_forward_list,
                user_gesture,
                kind: ScheduledNavigationKind::LocationChange {
                    origin,
                    url,
                    referrer,
                },
            },
        );
    }

    /// `location.reload()`: reloads the frame's document, bypassing the cache.
    pub fn schedule_refresh(&mut self, frame: FrameId, user_gesture: bool) {
        if !self.should_schedule_navigation(frame, None) {
            return;
        }
        let Some(document) = self.document(frame) else {
            return;
        };
        let origin = OriginDocument::capture(frame, document);
        let url = document.url.clone();
        let referrer = Some(document.url.to_string());
        self.schedule_navigation(
            frame,
            ScheduledNavigation {
                delay_seconds: 0.0,
                lock_back_forward_list: true,
                user_gesture,
                kind: ScheduledNavigationKind::Refresh {
                    origin,
                    url,
                    referrer,
                },
            },
        );
    }

    /// `history.go(steps)`. Out-of-range steps cancel whatever was scheduled.
    pub fn schedule_history_navigation(&mut self, frame: FrameId, steps: isize, user_gesture: bool) {
        if !self.should_schedule_navigation(frame, None) {
            return;
        }
        let in_range = self.page_of(frame).is_some_and(|page| {
            let back_forward = page.back_forward();
            steps.unsigned_abs()
                <= if steps > 0 {
                    back_forward.forward_list_count()
                } else {
                    back_forward.back_list_count()
                }
        });
        if !in_range {
            debug!("{frame}: history.go({steps}) is out of range");
            self.cancel_scheduled_navigation(frame);
            return;
        }
        self.schedule_navigation(
            frame,
            ScheduledNavigation {
                delay_seconds: 0.0,
                lock_back_forward_list: false,
                user_gesture,
                kind: ScheduledNavigationKind::HistoryNavigation { steps },
            },
        );
    }

    pub(crate) fn schedule_form_submission(&mut self, frame: FrameId, submission: FormSubmission, user_gesture: bool) {
        if !self.is_alive(frame) {
            return;
        }
        let lock_back_forward_list = self.must_lock_back_forward_list(frame, user_gesture);
        self.schedule_navigation(
            frame,
            ScheduledNavigation {
                delay_seconds: 0.0,
                lock_back_forward_list,
                user_gesture,
                kind: ScheduledNavigationKind::FormSubmission(Box::new(submission)),
            },
        );
    }

    /// Whether a script navigation of `frame` must replace the current history entry.
    pub fn must_lock_back_forward_list(&self, frame: FrameId, user_gesture: bool) -> bool {
        let Some(state) = self.frame_ref(frame) else {
            return false;
        };
        if let Some(document) = &state.document {
            if !user_gesture && !document.load_event_finished() {
                return true;
            }
            if !state.loader.state_machine.committed_multiple_real_loads() && is_about_blank(&document.url) {
                return true;
            }
        }
        state
            .parent
            .is_some_and(|parent| !self.all_ancestors_are_complete(parent))
    }

    pub fn location_change_pending(&self, frame: FrameId) -> bool {
        self.frame_ref(frame)
            .is_some_and(|state| state.scheduler.location_change_pending())
    }

    fn schedule_navigation(&mut self, frame: FrameId, navigation: ScheduledNavigation) {
        self.cancel_scheduled_navigation(frame);
        debug!(
            "{frame}: scheduled {:?} in {}s",
            navigation.kind, navigation.delay_seconds
        );
        if let Some(state) = self.frame_mut(frame) {
            state.scheduler.redirect = Some(navigation);
        }
        self.start_navigation_timer(frame);
    }

    pub fn cancel_scheduled_navigation(&mut self, frame: FrameId) {
        let Some(state) = self.frames.get_mut(&frame) else {
            return;
        };
        state.scheduler.redirect = None;
        if let Some(timer) = state.scheduler.timer.take() {
            self.tasks.cancel(timer);
        }
    }

    /// Arms the timer for the pending navigation; redirects wait until all ancestors are complete.
    pub(crate) fn start_navigation_timer(&mut self, frame: FrameId) {
        let Some(state) = self.frame_ref(frame) else {
            return;
        };
        let Some(redirect) = &state.scheduler.redirect else {
            return;
        };
        if state.scheduler.timer.is_some() {
            return;
        }
        let is_redirect = !redirect.is_location_change();
        let delay_ms = redirect.delay_ms();
        if is_redirect && !self.all_ancestors_are_complete(frame) {
            return;
        }
        let timer = self.tasks.post(delay_ms, Task::NavigationTimer(frame));
        if let Some(state) = self.frame_mut(frame) {
            state.scheduler.timer = Some(timer);
        }
    }

    fn navigation_timer_fired(&mut self, frame: FrameId, task: TaskId) {
        let Some(state) = self.frame_mut(frame) else {
            return;
        };
        if state.scheduler.timer != Some(task) {
            return;
        }
        state.scheduler.timer = None;
        if self.page_of(frame).is_none_or(|page| page.defers_loading) {
            return;
        }
        let Some(navigation) = self.frame_mut(frame).and_then(|state| state.scheduler.redirect.take()) else {
            return;
        };
        self.fire_scheduled_navigation(frame, navigation);
    }

    fn fire_scheduled_navigation(&mut self, frame: FrameId, navigation: ScheduledNavigation) {
        debug!("{frame}: firing {:?}", navigation.kind);
        let lock_back_forward_list = navigation.lock_back_forward_list;
        let is_form = navigation.is_form();
        let mut request = match navigation.kind {
            ScheduledNavigationKind::Redirect { origin, url } => {
                let reload = self
                    .document(frame)
                    .is_some_and(|document| equal_ignoring_fragment(&document.url, &url));
                let mut request = FrameLoadRequest::new(origin, ResourceRequest::new(url));
                if reload {
                    request.resource_request.cache_policy = CachePolicy::ReloadIgnoringCacheData;
                }
                request.client_redirect = ClientRedirectPolicy::ClientRedirect;
                request
            }
            ScheduledNavigationKind::LocationChange {
                origin,
                url,
                referrer,
            } => {
                let mut request = FrameLoadRequest::new(
                    Some(origin),
                    ResourceRequest::with_referrer(url, referrer.as_deref()),
                );
                request.client_redirect = ClientRedirectPolicy::ClientRedirect;
                request
            }
            ScheduledNavigationKind::Refresh {
                origin,
                url,
                referrer,
            } => {
                let mut resource_request = ResourceRequest::with_referrer(url, referrer.as_deref());
                resource_request.cache_policy = CachePolicy::ReloadIgnoringCacheData;
                let mut request = FrameLoadRequest::new(Some(origin), resource_request);
                request.client_redirect = ClientRedirectPolicy::ClientRedirect;
                request
            }
            ScheduledNavigationKind::HistoryNavigation { steps } => {
                if steps != 0 {
                    if let Some(page) = self.frame_ref(frame).map(|state| state.page) {
                        self.go_to_offset(page, steps);
                    }
                    return;
                }
                // go(0) reloads only this frame.
                let Some(document) = self.document(frame) else {
                    return;
                };
                FrameLoadRequest::new(
                    Some(OriginDocument::capture(frame, document)),
                    ResourceRequest::new(document.url.clone()),
                )
            }
            ScheduledNavigationKind::FormSubmission(submission) => {
                submission.frame_load_request(&self.privacy)
            }
        };
        // Form submissions keep their own target so unresolved names open a window.
        if request.frame_name.is_empty() && !is_form {
            request.frame_name = "_self".to_owned();
        }
        request.lock_back_forward_list = lock_back_forward_list;
        request.user_gesture = navigation.user_gesture;
        self.load(frame, request);
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use super::TaskQueue;
    use crate::ids::FrameId;

    #[test]
    fn due_tasks_run_in_time_then_posting_order() {
        let mut queue = TaskQueue::default();
        let late = queue.post(50, Task::NavigationTimer(FrameId(1)));
        let first = queue.post(0, Task::CheckCompleted(FrameId(1)));
        let second = queue.post(0, Task::CheckCompleted(FrameId(2)));

        assert_eq!(queue.take_due().map(|(id, _)| id), Some(first));
        assert_eq!(queue.take_due().map(|(id, _)| id), Some(second));
        assert_eq!(queue.take_due(), None);

        queue.advance_to(49);
        assert_eq!(queue.take_due(), None);
        queue.advance_to(50);
        assert_eq!(queue.take_due().map(|(id, _)| id), Some(late));
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let mut queue = TaskQueue::default();
        let id = queue.post(0, Task::DidAccessInitialDocument(FrameId(3)));
        assert!(queue.is_pending(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.take_due(), None);
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut queue = TaskQueue::default();
        queue.advance_to(10);
        queue.advance_to(5);
        assert_eq!(queue.now_ms(), 10);
    }
}
