//! The viewer's single owner of state.
//!
//! [`ViewerSession`] turns timer ticks and pointer input into [`Job`]s and folds
//! [`Completion`]s back into views. It never touches the network or the UI
//! itself, so everything here runs in tests without either.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::client::{
    BitmapImage, BitmapResponse, Completion, FetchRequest, IndexRequest, IndexResponse, Job,
    JobKind, LookupPurpose, Reply, SelectionResponse,
};
use crate::config::{BitmapSettings, ViewerConfig};
use crate::data::address::AddressRange;
use crate::data::form::{validate_selection, GranularityStep, SelectionForm};
use crate::data::mapper::{CellIndex, CoordinateMapper};
use crate::data::readout::{Readout, ReadoutCache};
use crate::data::scheduler::{ModeChange, PollScheduler, ResponseSequencer};
use crate::data::selection::{
    Corner, PendingSelection, PixelPos, PixelRect, SelectionMachine, SelectionRequest,
};
use crate::data::time::{TimeAxis, TimeIndex};
use crate::data::view::{BitmapType, BitmapView, PixelScale, ViewKind, ViewMode, ViewParams};
use crate::error::{Result, ViewerError};
use crate::events::{
    EventController, EventKind, FailureMeta, ModeMeta, SelectionMeta, ViewMeta, ViewerEvent,
};

/// A displayed bitmap: its description and its pixels.
#[derive(Debug, Clone)]
pub struct ViewSlot {
    view: BitmapView,
    image: BitmapImage,
    revision: u64,
}

impl ViewSlot {
    pub fn view(&self) -> &BitmapView {
        &self.view
    }

    pub fn image(&self) -> &BitmapImage {
        &self.image
    }

    /// Bumped every time the slot is replaced; lets the UI re-upload textures lazily.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// A released drag waiting for its corner addresses.
#[derive(Debug)]
struct PendingCommit {
    view: ViewKind,
    selection: PendingSelection,
}

pub struct ViewerSession {
    settings: BitmapSettings,
    addresses: AddressRange,
    bitmap_type: BitmapType,
    mapper: CoordinateMapper,

    scheduler: PollScheduler,
    fetches: ResponseSequencer,
    selections: ResponseSequencer,
    lookups: ResponseSequencer,

    origin: Option<ViewSlot>,
    selected: Option<ViewSlot>,
    revision: u64,
    last_update: Option<Instant>,

    readouts: ReadoutCache,
    hovered: Option<(ViewKind, CellIndex)>,
    selection: SelectionMachine,
    drag_view: Option<ViewKind>,
    pending: Option<PendingCommit>,
    /// Rows with a corner lookup in flight.
    corner_lookups: HashSet<(ViewKind, u64)>,
    form: SelectionForm,

    events: EventController,
    status: Option<String>,
}

impl ViewerSession {
    pub fn new(config: &ViewerConfig, events: EventController) -> Result<Self> {
        let settings = config.bitmap.clone();
        let addresses = settings.address_range()?;
        if settings.granularity > addresses.version().bits() {
            return Err(ViewerError::InvalidView {
                reason: format!(
                    "granularity /{} exceeds {} address width",
                    settings.granularity,
                    addresses.version()
                ),
            });
        }
        settings.fallback_time_axis()?;

        let mapper = CoordinateMapper::new(config.interaction.mapper_config());
        let ordering = config.interaction.response_ordering;
        Ok(Self {
            bitmap_type: settings.bitmap_type,
            scheduler: PollScheduler::new(
                ViewMode::Online,
                Duration::from_secs(u64::from(settings.interval_secs)),
            ),
            settings,
            addresses,
            mapper,
            fetches: ResponseSequencer::new(ordering),
            selections: ResponseSequencer::new(ordering),
            lookups: ResponseSequencer::new(ordering),
            origin: None,
            selected: None,
            revision: 0,
            last_update: None,
            readouts: ReadoutCache::new(),
            hovered: None,
            selection: SelectionMachine::new(mapper),
            drag_view: None,
            pending: None,
            corner_lookups: HashSet::new(),
            form: SelectionForm::default(),
            events,
            status: None,
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn bitmap_type(&self) -> BitmapType {
        self.bitmap_type
    }

    pub fn mode(&self) -> ViewMode {
        self.scheduler.mode()
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn slot(&self, kind: ViewKind) -> Option<&ViewSlot> {
        match kind {
            ViewKind::Origin => self.origin.as_ref(),
            ViewKind::Selected => self.selected.as_ref(),
        }
    }

    pub fn view(&self, kind: ViewKind) -> Option<&BitmapView> {
        self.slot(kind).map(ViewSlot::view)
    }

    pub fn latest_readout(&self) -> Option<&Readout> {
        self.readouts.latest()
    }

    pub fn readouts(&self) -> &ReadoutCache {
        &self.readouts
    }

    pub fn is_dragging(&self) -> bool {
        self.selection.is_dragging()
    }

    /// A released drag is waiting for the backend to resolve its corners.
    pub fn is_selection_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// View under the active drag and its pixel rectangle.
    pub fn drag(&self) -> Option<(ViewKind, PixelRect)> {
        Some((self.drag_view?, self.selection.drag_rect()?))
    }

    pub fn form(&self) -> &SelectionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SelectionForm {
        &mut self.form
    }

    pub fn events(&self) -> &EventController {
        &self.events
    }

    /// Last user-facing message (failed request, rejected selection).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn next_poll_in(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_due(now)
    }

    // ─── Cadence ─────────────────────────────────────────────────────────────

    /// First fetch; online mode also arms the refresh timer.
    pub fn start(&mut self, now: Instant) -> Vec<Job> {
        self.scheduler.start(now);
        vec![self.fetch_job()]
    }

    /// Fetch jobs that fell due since the last tick.
    pub fn tick(&mut self, now: Instant) -> Vec<Job> {
        if self.scheduler.poll(now) {
            tracing::trace!(mode = %self.scheduler.mode(), "refresh due");
            vec![self.fetch_job()]
        } else {
            Vec::new()
        }
    }

    /// Switch bitmap type: cancel the timer, fetch immediately, re-arm.
    pub fn restart(&mut self, now: Instant, bitmap_type: BitmapType) -> Vec<Job> {
        if bitmap_type != self.bitmap_type {
            tracing::info!(from = %self.bitmap_type, to = %bitmap_type, "bitmap type changed");
            self.bitmap_type = bitmap_type;
            self.emit(ViewerEvent::new(EventKind::BITMAP_TYPE_CHANGED));
        }
        self.cancel_drag();
        self.scheduler.restart(now);
        vec![self.fetch_job()]
    }

    fn fetch_job(&mut self) -> Job {
        Job {
            seq: self.fetches.issue(),
            kind: JobKind::Fetch(FetchRequest {
                bitmap_type: self.bitmap_type,
                scale: self.settings.scale.max(1),
            }),
        }
    }

    // ─── Pointer ─────────────────────────────────────────────────────────────

    /// Pointer over a bitmap. Returns a lookup job when it entered a new cell.
    pub fn hover(&mut self, kind: ViewKind, pos: PixelPos) -> Option<Job> {
        let cell = self
            .view(kind)
            .and_then(|view| self.mapper.pixel_to_index(pos.x, pos.y, view).ok());
        let Some(cell) = cell else {
            // Header band or beyond the image: nothing to read out.
            self.hovered = None;
            self.readouts.clear_latest();
            return None;
        };
        if self.hovered == Some((kind, cell)) {
            return None;
        }
        self.hovered = Some((kind, cell));
        let request = self.index_request(kind, cell, LookupPurpose::Hover)?;
        Some(Job {
            seq: self.lookups.issue(),
            kind: JobKind::ResolveIndex(request),
        })
    }

    /// Pointer left every bitmap.
    pub fn hover_exit(&mut self) {
        self.hovered = None;
        self.readouts.clear_latest();
    }

    /// Press on a bitmap. Starts a gesture (see [`Self::is_dragging`]) and
    /// returns a lookup for the anchor row when its address is not known yet.
    pub fn pointer_down(&mut self, kind: ViewKind, pos: PixelPos) -> Vec<Job> {
        let slot = match kind {
            ViewKind::Origin => self.origin.as_ref(),
            ViewKind::Selected => self.selected.as_ref(),
        };
        let Some(slot) = slot else {
            return Vec::new();
        };
        if !self.selection.pointer_down(pos, &slot.view, &self.readouts) {
            return Vec::new();
        }
        if let Some(previous) = self.pending.take() {
            tracing::debug!(
                view = previous.view.query_value(),
                "unresolved selection superseded by a new drag"
            );
        }
        self.drag_view = Some(kind);
        tracing::debug!(view = kind.query_value(), x = pos.x, y = pos.y, "drag started");
        let mut event = ViewerEvent::new(EventKind::SELECTION_STARTED);
        event.selection = Some(SelectionMeta {
            view: kind,
            request: None,
            reason: None,
        });
        self.emit(event);

        let waiting = self
            .selection
            .anchor()
            .filter(|anchor| anchor.is_waiting())
            .and_then(Corner::cell);
        self.corner_lookup_jobs(kind, waiting)
    }

    pub fn pointer_move(&mut self, pos: PixelPos) -> Option<PixelRect> {
        self.selection.pointer_move(pos)
    }

    /// Release anywhere.
    ///
    /// Returns the selection job when both corners are known, otherwise the
    /// lookups the selection waits for; it is sent from
    /// [`Self::on_completion`] once they land.
    pub fn pointer_up(&mut self, pos: Option<PixelPos>) -> Vec<Job> {
        let Some(kind) = self.drag_view.take() else {
            self.selection.cancel();
            return Vec::new();
        };
        let slot = match kind {
            ViewKind::Origin => self.origin.as_ref(),
            ViewKind::Selected => self.selected.as_ref(),
        };
        let Some(slot) = slot else {
            self.selection.cancel();
            return Vec::new();
        };
        let Some(selection) = self.selection.pointer_up(pos, &slot.view, &self.readouts) else {
            return Vec::new();
        };

        let waiting = selection.waiting_on();
        self.pending = Some(PendingCommit {
            view: kind,
            selection,
        });
        if waiting.is_empty() {
            return self.finish_selection().into_iter().collect();
        }
        tracing::debug!(
            view = kind.query_value(),
            corners = waiting.len(),
            "selection waiting for address lookups"
        );
        self.status = Some("Resolving the selection corners...".to_string());
        self.corner_lookup_jobs(kind, waiting)
    }

    /// Drop an active drag and any selection still waiting for its corners.
    pub fn cancel_drag(&mut self) {
        self.selection.cancel();
        self.drag_view = None;
        if self.pending.take().is_some() {
            tracing::debug!("unresolved selection dropped");
        }
    }

    /// Lookups for corner rows that are neither cached nor already asked for.
    fn corner_lookup_jobs(
        &mut self,
        kind: ViewKind,
        cells: impl IntoIterator<Item = CellIndex>,
    ) -> Vec<Job> {
        let mut jobs = Vec::new();
        for cell in cells {
            if self.corner_lookups.contains(&(kind, cell.ip_index)) {
                continue;
            }
            let Some(request) = self.index_request(kind, cell, LookupPurpose::Corner) else {
                continue;
            };
            self.corner_lookups.insert((kind, cell.ip_index));
            jobs.push(Job {
                seq: self.lookups.issue(),
                kind: JobKind::ResolveIndex(request),
            });
        }
        jobs
    }

    fn index_request(
        &self,
        kind: ViewKind,
        cell: CellIndex,
        purpose: LookupPurpose,
    ) -> Option<IndexRequest> {
        let view = self.view(kind)?;
        let first_time = match view.time_axis() {
            TimeAxis::Timestamps { .. } => Some(view.time_at(0)),
            TimeAxis::Intervals { .. } => None,
        };
        Some(IndexRequest {
            view: kind,
            first_ip: view.origin_address().clone(),
            first_time,
            cell,
            purpose,
        })
    }

    /// Commit the pending selection if its corners are known by now.
    fn finish_selection(&mut self) -> Option<Job> {
        let PendingCommit {
            view: kind,
            mut selection,
        } = self.pending.take()?;
        let slot = match kind {
            ViewKind::Origin => self.origin.as_ref(),
            ViewKind::Selected => self.selected.as_ref(),
        };
        let Some(slot) = slot else {
            tracing::debug!(view = kind.query_value(), "view of the pending selection is gone");
            return None;
        };
        let view = &slot.view;
        selection.refresh(view, &self.readouts);
        let outcome = match selection.commit(view) {
            Some(result) => {
                result.and_then(|request| validate_selection(&request, view).map(|()| request))
            }
            None => {
                self.pending = Some(PendingCommit {
                    view: kind,
                    selection,
                });
                return None;
            }
        };

        match outcome {
            Ok(request) => {
                self.form.fill_from_request(&request);
                Some(self.submit_request(kind, request))
            }
            Err(err) => {
                self.reject(kind, &err);
                None
            }
        }
    }

    // ─── Form ────────────────────────────────────────────────────────────────

    pub fn step_granularity(&mut self, step: GranularityStep) {
        if let Some(slot) = &self.origin {
            self.form.step_granularity(step, &slot.view);
        }
    }

    /// Refill the form with the whole origin view.
    pub fn reset_form(&mut self) {
        if let Some(slot) = &self.origin {
            self.form = SelectionForm::from_view(&slot.view);
        }
    }

    /// Validate the form against the origin view; nothing is sent on error.
    pub fn submit_form(&mut self) -> Result<Job> {
        let Some(slot) = &self.origin else {
            return Err(ViewerError::MissingBitmap);
        };
        match self.form.to_request(&slot.view) {
            Ok(request) => Ok(self.submit_request(ViewKind::Origin, request)),
            Err(err) => {
                self.reject(ViewKind::Origin, &err);
                Err(err)
            }
        }
    }

    fn submit_request(&mut self, view: ViewKind, request: SelectionRequest) -> Job {
        tracing::info!(
            addresses = %request.addresses,
            times = %request.times,
            granularity = request.granularity,
            "selection committed"
        );
        self.status = None;
        let mut event = ViewerEvent::new(EventKind::SELECTION_COMMITTED);
        event.selection = Some(SelectionMeta {
            view,
            request: Some(request.clone()),
            reason: None,
        });
        self.emit(event);
        Job {
            seq: self.selections.issue(),
            kind: JobKind::Select(request),
        }
    }

    fn reject(&mut self, view: ViewKind, err: &ViewerError) {
        tracing::info!(view = view.query_value(), error = %err, "selection rejected");
        self.status = Some(err.to_string());
        let mut event = ViewerEvent::new(EventKind::SELECTION_REJECTED);
        event.selection = Some(SelectionMeta {
            view,
            request: None,
            reason: Some(err.to_string()),
        });
        self.emit(event);
    }

    // ─── Completions ─────────────────────────────────────────────────────────

    /// Fold one finished request back into the session.
    ///
    /// Returns follow-up jobs: the selection a corner lookup was holding back.
    pub fn on_completion(&mut self, completion: Completion, now: Instant) -> Vec<Job> {
        let Completion { job, result } = completion;
        if let JobKind::ResolveIndex(request) = &job.kind {
            return self.on_lookup(&job, request, result);
        }
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                self.on_failure(&job, err);
                return Vec::new();
            }
        };

        let sequencer = match &job.kind {
            JobKind::Fetch(_) => &mut self.fetches,
            JobKind::ResolveIndex(_) => &mut self.lookups,
            JobKind::Select(_) => &mut self.selections,
        };
        if !sequencer.accept(job.seq) {
            tracing::debug!(
                seq = job.seq,
                kind = job.kind.label(),
                applied = ?sequencer.last_applied(),
                "dropping stale response"
            );
            self.emit_stale(&job);
            return Vec::new();
        }

        let applied = match (&job.kind, reply) {
            (JobKind::Fetch(request), Reply::Bitmap(response)) => {
                self.apply_bitmap(job.seq, request, response, now)
            }
            (JobKind::Select(request), Reply::Selection(response)) => {
                self.apply_selection(job.seq, request, response)
            }
            (kind, _) => Err(ViewerError::network(
                None,
                format!("{} answered with an unexpected reply", kind.label()),
            )),
        };
        if let Err(err) = applied {
            self.on_failure(&job, err);
        }
        Vec::new()
    }

    /// Lookups skip the stream gate for the row cache: every answer names a
    /// fixed row. Only the hover label follows the ordering policy.
    fn on_lookup(&mut self, job: &Job, request: &IndexRequest, result: Result<Reply>) -> Vec<Job> {
        let row = (request.view, request.cell.ip_index);
        if request.purpose == LookupPurpose::Corner {
            self.corner_lookups.remove(&row);
        }
        let response = match result {
            Ok(Reply::Index(response)) => response,
            Ok(_) => {
                let err = ViewerError::network(None, "resolve_index answered with an unexpected reply");
                self.fail_lookup(job, row, err);
                return Vec::new();
            }
            Err(err) => {
                self.fail_lookup(job, row, err);
                return Vec::new();
            }
        };
        self.apply_index(job.seq, request, response);
        self.finish_selection().into_iter().collect()
    }

    fn fail_lookup(&mut self, job: &Job, row: (ViewKind, u64), err: ViewerError) {
        self.on_failure(job, err);
        let blocked = self.pending.as_ref().is_some_and(|pending| {
            pending.view == row.0
                && pending
                    .selection
                    .waiting_on()
                    .iter()
                    .any(|cell| cell.ip_index == row.1)
        });
        if blocked {
            self.pending = None;
            self.reject(
                row.0,
                &ViewerError::invalid_selection("address lookup failed; selection dropped"),
            );
        }
    }

    fn apply_bitmap(
        &mut self,
        seq: u64,
        request: &FetchRequest,
        response: BitmapResponse,
        now: Instant,
    ) -> Result<()> {
        let BitmapResponse {
            image,
            mode,
            interval_range,
            time_first,
            time_last,
        } = response;

        let interval_secs = self.settings.interval_secs;
        let time_axis = match time_first {
            Some(first) => TimeAxis::Timestamps {
                first,
                interval_secs,
            },
            None => self.settings.fallback_time_axis()?,
        };
        let declared = match (interval_range, declared_span(time_first, time_last, interval_secs)) {
            (Some(range), Some(span)) => Some(range.min(span)),
            (range, span) => range.or(span),
        };
        let time_count = declared.map(|n| match self.settings.window {
            0 => n,
            window => n.min(window),
        });
        let mode = mode.unwrap_or(self.scheduler.mode());

        let view = BitmapView::new(ViewParams {
            kind: ViewKind::Origin,
            bitmap_type: request.bitmap_type,
            addresses: self.addresses.clone(),
            granularity: self.settings.granularity,
            time_axis,
            ip_count: None,
            time_count,
            width_px: image.width,
            height_px: image.height,
            scale: PixelScale::uniform(request.scale.max(1)),
            mode,
            orientation: self.settings.orientation,
        })?;

        self.apply_mode(mode);
        self.scheduler
            .set_period(Duration::from_secs(u64::from(view.interval_secs())));

        let first_view = self.origin.is_none();
        self.replace_slot(ViewKind::Origin, view, image);
        if first_view {
            self.reset_form();
        }
        self.last_update = Some(now);
        tracing::debug!(seq, bitmap = %request.bitmap_type, "origin bitmap updated");
        self.emit_view(EventKind::BITMAP_UPDATED, ViewKind::Origin, seq);
        Ok(())
    }

    fn apply_selection(
        &mut self,
        seq: u64,
        request: &SelectionRequest,
        response: SelectionResponse,
    ) -> Result<()> {
        let SelectionResponse {
            image,
            ip_unit,
            time_unit,
        } = response;

        let interval_secs = self.settings.interval_secs;
        let time_axis = match request.times.first() {
            TimeIndex::Timestamp(first) => TimeAxis::Timestamps {
                first,
                interval_secs,
            },
            TimeIndex::Interval(first) => TimeAxis::Intervals {
                first,
                interval_secs,
            },
        };
        let view = BitmapView::new(ViewParams {
            kind: ViewKind::Selected,
            bitmap_type: request.bitmap_type,
            addresses: request.addresses.clone(),
            granularity: request.granularity,
            time_axis,
            ip_count: None,
            time_count: None,
            width_px: image.width,
            height_px: image.height,
            scale: PixelScale {
                ip: ip_unit,
                time: time_unit,
            },
            mode: self.scheduler.mode(),
            orientation: self.settings.orientation,
        })?;

        self.replace_slot(ViewKind::Selected, view, image);
        tracing::debug!(seq, addresses = %request.addresses, "selected bitmap updated");
        self.emit_view(EventKind::SELECTED_BITMAP_UPDATED, ViewKind::Selected, seq);
        Ok(())
    }

    fn apply_index(&mut self, seq: u64, request: &IndexRequest, response: IndexResponse) {
        // The lookup was for a view that has since been replaced by another range.
        let still_current = self
            .view(request.view)
            .is_some_and(|view| view.origin_address() == &request.first_ip);
        if !still_current {
            tracing::debug!(view = request.view.query_value(), "discarding lookup for a replaced view");
            return;
        }
        let readout = Readout {
            kind: request.view,
            cell: request.cell,
            address: response.address,
            time: response.time,
            colour: response.colour,
        };
        let label = request.purpose == LookupPurpose::Hover;
        if label && self.lookups.accept(seq) {
            self.readouts.record(readout.clone());
            let mut event = ViewerEvent::new(EventKind::HOVER);
            event.hover = Some(readout);
            self.emit(event);
            return;
        }
        // Too old for the label, or never meant for it; the row is still good.
        self.readouts
            .remember(readout.kind, readout.cell.ip_index, readout.address.into());
        if label {
            tracing::debug!(seq, applied = ?self.lookups.last_applied(), "dropping stale hover readout");
            self.emit_stale_seq(seq, "resolve_index");
        }
    }

    fn apply_mode(&mut self, mode: ViewMode) {
        let from = self.scheduler.mode();
        let applied = match self.scheduler.apply_mode(mode) {
            ModeChange::Unchanged => return,
            ModeChange::WentOffline => {
                tracing::info!("backend went offline; periodic refresh stopped");
                true
            }
            ModeChange::Ignored => {
                tracing::warn!(from = %from, to = %mode, "ignoring unsupported mode transition");
                false
            }
        };
        let mut event = ViewerEvent::new(EventKind::MODE_CHANGED);
        event.mode = Some(ModeMeta {
            from,
            to: mode,
            applied,
        });
        self.emit(event);
    }

    fn replace_slot(&mut self, kind: ViewKind, view: BitmapView, image: BitmapImage) {
        let previous = match kind {
            ViewKind::Origin => self.origin.as_ref(),
            ViewKind::Selected => self.selected.as_ref(),
        };
        let rows_moved = previous.map_or(true, |slot| !same_rows(&slot.view, &view));
        let geometry_changed = previous.map_or(true, |slot| !same_geometry(&slot.view, &view));

        if rows_moved {
            self.readouts.invalidate(kind);
            self.corner_lookups.retain(|(k, _)| *k != kind);
            if self.pending.as_ref().is_some_and(|pending| pending.view == kind) {
                self.pending = None;
                self.reject(
                    kind,
                    &ViewerError::invalid_selection("bitmap changed before the selection was resolved"),
                );
            }
        }
        if geometry_changed && self.drag_view == Some(kind) {
            tracing::debug!(view = kind.query_value(), "view under the drag was replaced");
            self.cancel_drag();
        }
        if self.hovered.is_some_and(|(k, _)| k == kind) {
            self.hovered = None;
        }

        self.revision += 1;
        let slot = ViewSlot {
            view,
            image,
            revision: self.revision,
        };
        match kind {
            ViewKind::Origin => self.origin = Some(slot),
            ViewKind::Selected => self.selected = Some(slot),
        }
    }

    fn on_failure(&mut self, job: &Job, err: ViewerError) {
        let status = match &err {
            ViewerError::NetworkFailure { status, .. } => *status,
            ViewerError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        };
        if err.is_transient() {
            tracing::warn!(seq = job.seq, job = job.kind.label(), error = %err, "backend request failed");
        } else {
            tracing::error!(seq = job.seq, job = job.kind.label(), error = %err, "backend response unusable");
        }
        self.status = Some(err.to_string());
        let mut event = ViewerEvent::new(EventKind::NETWORK_FAILURE);
        event.failure = Some(FailureMeta {
            seq: job.seq,
            job: job.kind.label(),
            status,
            message: err.to_string(),
        });
        self.emit(event);
    }

    fn emit_stale(&self, job: &Job) {
        self.emit_stale_seq(job.seq, job.kind.label());
    }

    fn emit_stale_seq(&self, seq: u64, job: &'static str) {
        let mut event = ViewerEvent::new(EventKind::STALE_RESPONSE_DROPPED);
        event.failure = Some(FailureMeta {
            seq,
            job,
            status: None,
            message: "superseded by a newer response".to_string(),
        });
        self.emit(event);
    }

    fn emit_view(&self, kinds: EventKind, view: ViewKind, seq: u64) {
        let Some(slot) = self.slot(view) else {
            return;
        };
        let mut event = ViewerEvent::new(kinds);
        event.view = Some(ViewMeta {
            view,
            bitmap_type: slot.view.bitmap_type(),
            width_px: slot.view.width_px(),
            height_px: slot.view.height_px(),
            seq,
        });
        self.emit(event);
    }

    fn emit(&self, event: ViewerEvent) {
        self.events.emit(event);
    }
}

/// Columns from `Time_first` through `Time_last`, both included.
fn declared_span(
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
    interval_secs: u32,
) -> Option<u64> {
    let seconds = (last? - first?).num_seconds();
    let seconds = u64::try_from(seconds).ok()?;
    Some(seconds / u64::from(interval_secs.max(1)) + 1)
}

/// Row `i` still names the same addresses.
fn same_rows(a: &BitmapView, b: &BitmapView) -> bool {
    a.addresses() == b.addresses()
        && a.granularity() == b.granularity()
        && a.orientation() == b.orientation()
        && a.ip_count() == b.ip_count()
}

/// Pixel positions still land on the same cells.
fn same_geometry(a: &BitmapView, b: &BitmapView) -> bool {
    same_rows(a, b)
        && a.width_px() == b.width_px()
        && a.height_px() == b.height_px()
        && a.scale() == b.scale()
}
