use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use activity_viewer::client::{
    BitmapResponse, Completion, IndexResponse, Job, JobKind, LookupPurpose, Reply,
    SelectionResponse,
};
use activity_viewer::config::ViewerConfig;
use activity_viewer::data::readout::CellColour;
use activity_viewer::data::scheduler::ResponseOrdering;
use activity_viewer::data::selection::PixelPos;
use activity_viewer::data::selection::SelectionRequest;
use activity_viewer::data::time::{parse_timestamp, TimeIndex};
use activity_viewer::data::view::{BitmapType, IpAxisOrientation, ViewKind, ViewMode};
use activity_viewer::events::{EventController, EventFilter, EventKind, ViewerEvent};
use activity_viewer::{ViewerError, ViewerSession};

mod common;
use common::{addr, blank_image};

fn config(ordering: ResponseOrdering) -> ViewerConfig {
    let mut config = ViewerConfig::default();
    config.bitmap.first_ip = "192.168.0.0".to_string();
    config.bitmap.last_ip = "192.168.0.255".to_string();
    config.bitmap.orientation = IpAxisOrientation::OriginAtTop;
    config.interaction.chrome_offset_y = 0;
    config.interaction.response_ordering = ordering;
    config
}

fn session(ordering: ResponseOrdering) -> ViewerSession {
    ViewerSession::new(&config(ordering), EventController::new()).unwrap()
}

fn bitmap(width: u32, height: u32, mode: ViewMode) -> Reply {
    Reply::Bitmap(BitmapResponse {
        image: blank_image(width, height),
        mode: Some(mode),
        interval_range: None,
        time_first: None,
        time_last: None,
    })
}

fn ok(job: Job, reply: Reply) -> Completion {
    Completion {
        job,
        result: Ok(reply),
    }
}

fn single(jobs: Vec<Job>) -> Job {
    assert_eq!(jobs.len(), 1, "expected exactly one job, got {jobs:?}");
    jobs.into_iter().next().unwrap()
}

fn drain(rx: &Receiver<ViewerEvent>) -> Vec<ViewerEvent> {
    rx.try_iter().collect()
}

/// Session showing a 20 x 256 cell origin bitmap at 2 px per cell.
fn loaded(ordering: ResponseOrdering, now: Instant) -> ViewerSession {
    let mut s = session(ordering);
    let job = single(s.start(now));
    s.on_completion(ok(job, bitmap(40, 512, ViewMode::Online)), now);
    s
}

fn answered(job: Job, address: &str) -> Completion {
    ok(
        job,
        Reply::Index(IndexResponse {
            address: Some(addr(address)),
            time: None,
            colour: CellColour::White,
        }),
    )
}

fn resolve(s: &mut ViewerSession, pos: PixelPos, address: &str, now: Instant) {
    let job = s.hover(ViewKind::Origin, pos).expect("new cell should trigger a lookup");
    assert!(s.on_completion(answered(job, address), now).is_empty());
}

/// The row and purpose of a lookup job.
fn lookup_of(job: &Job) -> (u64, u64, LookupPurpose) {
    match &job.kind {
        JobKind::ResolveIndex(request) => (
            request.cell.ip_index,
            request.cell.time_ordinal,
            request.purpose,
        ),
        other => panic!("expected a lookup, got {other:?}"),
    }
}

fn selection_of(job: &Job) -> &SelectionRequest {
    match &job.kind {
        JobKind::Select(request) => request,
        other => panic!("expected a selection job, got {other:?}"),
    }
}

#[test]
fn first_fetch_builds_the_origin_view() {
    let now = Instant::now();
    let s = loaded(ResponseOrdering::LatestIssued, now);
    let view = s.view(ViewKind::Origin).unwrap();
    assert_eq!(view.ip_count(), 256);
    assert_eq!(view.time_count(), 20);
    assert_eq!(s.form().first_ip, "192.168.0.0");
    assert_eq!(s.form().last_time, "19");
    assert_eq!(s.last_update(), Some(now));
    assert_eq!(s.next_poll_in(now), Some(Duration::from_secs(60)));
}

#[test]
fn interval_range_is_capped_by_the_window() {
    let now = Instant::now();
    let mut cfg = config(ResponseOrdering::LatestIssued);
    cfg.bitmap.window = 10;
    let mut s = ViewerSession::new(&cfg, EventController::new()).unwrap();
    let job = single(s.start(now));
    s.on_completion(
        ok(
            job,
            Reply::Bitmap(BitmapResponse {
                image: blank_image(40, 512),
                mode: Some(ViewMode::Online),
                interval_range: Some(42),
                time_first: None,
                time_last: None,
            }),
        ),
        now,
    );
    assert_eq!(s.view(ViewKind::Origin).unwrap().time_count(), 10);
}

#[test]
fn ticks_fetch_once_per_period() {
    let t0 = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, t0);
    assert!(s.tick(t0 + Duration::from_secs(59)).is_empty());
    let job = single(s.tick(t0 + Duration::from_secs(60)));
    assert!(matches!(job.kind, JobKind::Fetch(_)));
    assert!(s.tick(t0 + Duration::from_secs(61)).is_empty());
}

#[test]
fn slow_first_response_is_dropped_when_latest_wins() {
    let t0 = Instant::now();
    let mut s = session(ResponseOrdering::LatestIssued);
    let rx = s.events().subscribe(EventFilter::only(EventKind::STALE_RESPONSE_DROPPED));

    let first = single(s.start(t0));
    let second = single(s.restart(t0 + Duration::from_millis(100), BitmapType::Source));
    assert!(second.seq > first.seq);

    s.on_completion(ok(second, bitmap(40, 512, ViewMode::Online)), t0);
    s.on_completion(ok(first, bitmap(20, 512, ViewMode::Online)), t0);

    assert_eq!(s.view(ViewKind::Origin).unwrap().width_px(), 40);
    assert_eq!(drain(&rx).len(), 1);
}

#[test]
fn slow_first_response_overwrites_in_arrival_order() {
    let t0 = Instant::now();
    let mut s = session(ResponseOrdering::ArrivalOrder);

    let first = single(s.start(t0));
    let second = single(s.restart(t0 + Duration::from_millis(100), BitmapType::Source));

    s.on_completion(ok(second, bitmap(40, 512, ViewMode::Online)), t0);
    s.on_completion(ok(first, bitmap(20, 512, ViewMode::Online)), t0);

    assert_eq!(s.view(ViewKind::Origin).unwrap().width_px(), 20);
}

#[test]
fn offline_header_stops_polling() {
    let t0 = Instant::now();
    let mut s = session(ResponseOrdering::LatestIssued);
    let rx = s.events().subscribe(EventFilter::only(EventKind::MODE_CHANGED));

    let job = single(s.start(t0));
    assert!(s.scheduler().is_armed());
    s.on_completion(ok(job, bitmap(40, 512, ViewMode::Offline)), t0);

    assert_eq!(s.mode(), ViewMode::Offline);
    assert!(!s.scheduler().is_armed());
    assert!(s.tick(t0 + Duration::from_secs(3600)).is_empty());

    let events = drain(&rx);
    assert_eq!(events.len(), 1);
    let mode = events[0].mode.unwrap();
    assert_eq!((mode.from, mode.to, mode.applied), (ViewMode::Online, ViewMode::Offline, true));

    // A later online header does not bring polling back.
    let job = single(s.restart(t0, BitmapType::Destination));
    s.on_completion(ok(job, bitmap(40, 512, ViewMode::Online)), t0);
    assert_eq!(s.mode(), ViewMode::Offline);
    assert!(!s.scheduler().is_armed());
    assert!(!drain(&rx)[0].mode.unwrap().applied);
}

#[test]
fn network_failure_keeps_polling() {
    let t0 = Instant::now();
    let mut s = session(ResponseOrdering::LatestIssued);
    let rx = s.events().subscribe(EventFilter::only(EventKind::NETWORK_FAILURE));

    let job = single(s.start(t0));
    s.on_completion(
        Completion {
            job,
            result: Err(ViewerError::network(Some(404), "GET image_s.png returned 404")),
        },
        t0,
    );

    assert!(s.view(ViewKind::Origin).is_none());
    assert!(s.status().unwrap().contains("404"));
    assert!(s.scheduler().is_armed());
    let failure = drain(&rx).remove(0).failure.unwrap();
    assert_eq!(failure.status, Some(404));
    assert_eq!(failure.job, "fetch");

    // The next scheduled attempt still goes out.
    assert_eq!(s.tick(t0 + Duration::from_secs(60)).len(), 1);
}

#[test]
fn hover_looks_up_each_cell_once() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::HOVER));

    let job = s.hover(ViewKind::Origin, PixelPos::new(4, 20)).unwrap();
    match &job.kind {
        JobKind::ResolveIndex(request) => {
            assert_eq!(request.cell.ip_index, 10);
            assert_eq!(request.cell.time_ordinal, 2);
            assert_eq!(request.first_ip, addr("192.168.0.0"));
            assert_eq!(request.first_time, None);
        }
        other => panic!("unexpected job {other:?}"),
    }
    // Same cell, different pixel.
    assert!(s.hover(ViewKind::Origin, PixelPos::new(5, 21)).is_none());
    // Outside the image.
    assert!(s.hover(ViewKind::Origin, PixelPos::new(400, 21)).is_none());

    s.on_completion(
        ok(
            job,
            Reply::Index(IndexResponse {
                address: Some(addr("192.168.0.10")),
                time: Some(TimeIndex::Interval(2)),
                colour: CellColour::White,
            }),
        ),
        now,
    );
    let readout = s.latest_readout().unwrap();
    assert_eq!(readout.address, Some(addr("192.168.0.10")));
    assert_eq!(drain(&rx).len(), 1);

    s.hover_exit();
    assert!(s.latest_readout().is_none());
}

#[test]
fn drag_commits_a_selection_and_shows_the_zoom() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(
        EventKind::SELECTION_STARTED | EventKind::SELECTION_COMMITTED | EventKind::SELECTED_BITMAP_UPDATED,
    ));

    resolve(&mut s, PixelPos::new(4, 20), "192.168.0.10", now);
    resolve(&mut s, PixelPos::new(14, 10), "192.168.0.5", now);

    assert!(s.pointer_down(ViewKind::Origin, PixelPos::new(4, 20)).is_empty());
    assert!(s.is_dragging());
    s.pointer_move(PixelPos::new(14, 10));
    assert_eq!(s.drag().map(|(kind, _)| kind), Some(ViewKind::Origin));

    let job = single(s.pointer_up(Some(PixelPos::new(14, 10))));
    assert!(!s.is_dragging());
    assert!(!s.is_selection_pending());
    let request = selection_of(&job);
    assert_eq!(request.addresses.low(), &addr("192.168.0.5"));
    assert_eq!(request.addresses.high(), &addr("192.168.0.10"));
    assert_eq!(request.times.first(), TimeIndex::Interval(2));
    assert_eq!(request.times.last(), TimeIndex::Interval(7));
    assert_eq!(request.bitmap_type, BitmapType::Source);
    assert_eq!(s.form().first_ip, "192.168.0.5");
    assert_eq!(s.form().last_time, "7");

    s.on_completion(
        ok(
            job,
            Reply::Selection(SelectionResponse {
                image: blank_image(12, 12),
                ip_unit: 2,
                time_unit: 2,
            }),
        ),
        now,
    );
    let zoom = s.view(ViewKind::Selected).unwrap();
    assert_eq!(zoom.ip_count(), 6);
    assert_eq!(zoom.time_count(), 6);
    assert_eq!(zoom.origin_address(), &addr("192.168.0.5"));

    let kinds: Vec<EventKind> = drain(&rx).into_iter().map(|e| e.kinds).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SELECTION_STARTED,
            EventKind::SELECTION_COMMITTED,
            EventKind::SELECTED_BITMAP_UPDATED
        ]
    );
}

#[test]
fn click_without_drag_is_rejected() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::SELECTION_REJECTED));

    resolve(&mut s, PixelPos::new(4, 20), "192.168.0.10", now);
    assert!(s.pointer_down(ViewKind::Origin, PixelPos::new(4, 20)).is_empty());
    assert!(s.pointer_up(Some(PixelPos::new(4, 20))).is_empty());

    assert!(s.status().is_some());
    let event = drain(&rx).remove(0);
    assert!(event.selection.unwrap().reason.is_some());
}

#[test]
fn form_rejection_sends_nothing() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);

    s.form_mut().first_ip = "192.168.1.0".to_string();
    s.form_mut().last_ip = "192.168.1.9".to_string();
    assert!(matches!(
        s.submit_form(),
        Err(ViewerError::InvalidSelection { .. })
    ));
    assert!(s.status().unwrap().contains("outside"));

    s.reset_form();
    let job = s.submit_form().unwrap();
    assert!(matches!(job.kind, JobKind::Select(_)));
    assert_eq!(s.status(), None);
}

#[test]
fn form_needs_a_bitmap() {
    let mut s = session(ResponseOrdering::LatestIssued);
    assert!(matches!(s.submit_form(), Err(ViewerError::MissingBitmap)));
    assert!(s.pointer_down(ViewKind::Origin, PixelPos::new(1, 1)).is_empty());
    assert!(!s.is_dragging());
}

#[test]
fn switching_type_cancels_the_drag() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::BITMAP_TYPE_CHANGED));

    let anchor_lookup = single(s.pointer_down(ViewKind::Origin, PixelPos::new(4, 20)));
    let job = single(s.restart(now, BitmapType::Both));
    assert!(!s.is_dragging());
    assert_eq!(s.bitmap_type(), BitmapType::Both);
    match job.kind {
        JobKind::Fetch(request) => assert_eq!(request.bitmap_type, BitmapType::Both),
        other => panic!("unexpected job {other:?}"),
    }
    assert_eq!(drain(&rx).len(), 1);

    // The anchor answer arriving afterwards commits nothing.
    assert!(s.on_completion(answered(anchor_lookup, "192.168.0.10"), now).is_empty());
}

#[test]
fn anchor_lookup_landing_mid_drag_is_used() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);

    // Nothing was hovered before the press, so the anchor row is looked up.
    let anchor_lookup = single(s.pointer_down(ViewKind::Origin, PixelPos::new(0, 20)));
    assert_eq!(lookup_of(&anchor_lookup), (10, 0, LookupPurpose::Corner));
    s.pointer_move(PixelPos::new(6, 60));

    assert!(s.on_completion(answered(anchor_lookup, "192.168.0.10"), now).is_empty());
    assert!(s.is_dragging());
    resolve(&mut s, PixelPos::new(10, 100), "192.168.0.50", now);

    let job = single(s.pointer_up(Some(PixelPos::new(10, 100))));
    let request = selection_of(&job);
    assert_eq!(request.addresses.low(), &addr("192.168.0.10"));
    assert_eq!(request.addresses.high(), &addr("192.168.0.50"));
    assert_eq!(request.times.first(), TimeIndex::Interval(0));
    assert_eq!(request.times.last(), TimeIndex::Interval(5));
}

#[test]
fn unresolved_release_waits_for_its_lookup() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::SELECTION_COMMITTED));

    resolve(&mut s, PixelPos::new(0, 20), "192.168.0.10", now);
    assert!(s.pointer_down(ViewKind::Origin, PixelPos::new(0, 20)).is_empty());

    // Row 50 was never hovered: no selection goes out yet.
    let lookup = single(s.pointer_up(Some(PixelPos::new(10, 100))));
    assert_eq!(lookup_of(&lookup), (50, 5, LookupPurpose::Corner));
    assert!(!s.is_dragging());
    assert!(s.is_selection_pending());
    assert!(drain(&rx).is_empty());

    let job = single(s.on_completion(answered(lookup, "192.168.0.50"), now));
    assert!(!s.is_selection_pending());
    let request = selection_of(&job);
    assert_eq!(request.addresses.low(), &addr("192.168.0.10"));
    assert_eq!(request.addresses.high(), &addr("192.168.0.50"));
    assert_eq!(request.times.first(), TimeIndex::Interval(0));
    assert_eq!(request.times.last(), TimeIndex::Interval(5));
    assert_eq!(s.status(), None);
    assert_eq!(drain(&rx).len(), 1);
}

#[test]
fn release_on_the_anchor_row_reuses_its_lookup() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);

    let anchor = single(s.pointer_down(ViewKind::Origin, PixelPos::new(0, 20)));
    // Same row as the anchor, whose lookup is already in flight.
    assert!(s.pointer_up(Some(PixelPos::new(10, 21))).is_empty());
    assert!(s.is_selection_pending());

    // One row tall: validated once the address is known, then refused.
    assert!(s.on_completion(answered(anchor, "192.168.0.10"), now).is_empty());
    assert!(!s.is_selection_pending());
    assert!(s.status().unwrap().contains("zero-width address range"));
}

#[test]
fn failed_corner_lookup_drops_the_selection() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(
        EventKind::SELECTION_REJECTED | EventKind::NETWORK_FAILURE,
    ));

    resolve(&mut s, PixelPos::new(0, 20), "192.168.0.10", now);
    s.pointer_down(ViewKind::Origin, PixelPos::new(0, 20));
    let lookup = single(s.pointer_up(Some(PixelPos::new(10, 100))));

    let follow_ups = s.on_completion(
        Completion {
            job: lookup,
            result: Err(ViewerError::network(Some(503), "calculate_index returned 503")),
        },
        now,
    );
    assert!(follow_ups.is_empty());
    assert!(!s.is_selection_pending());
    assert!(s.status().unwrap().contains("lookup failed"));
    let kinds: Vec<EventKind> = drain(&rx).into_iter().map(|e| e.kinds).collect();
    assert_eq!(
        kinds,
        vec![EventKind::NETWORK_FAILURE, EventKind::SELECTION_REJECTED]
    );
}

#[test]
fn pending_selection_is_dropped_when_rows_move() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::SELECTION_REJECTED));

    resolve(&mut s, PixelPos::new(0, 20), "192.168.0.10", now);
    s.pointer_down(ViewKind::Origin, PixelPos::new(0, 20));
    let lookup = single(s.pointer_up(Some(PixelPos::new(10, 100))));

    // The refresh comes back half as tall: every row now covers other pixels.
    let refresh = single(s.tick(now + Duration::from_secs(60)));
    s.on_completion(ok(refresh, bitmap(40, 256, ViewMode::Online)), now);
    assert!(!s.is_selection_pending());
    assert_eq!(drain(&rx).len(), 1);

    assert!(s.on_completion(answered(lookup, "192.168.0.50"), now).is_empty());
}

#[test]
fn release_above_a_bottom_origin_image_takes_the_view_minimum() {
    let now = Instant::now();
    let mut cfg = config(ResponseOrdering::LatestIssued);
    cfg.bitmap.orientation = IpAxisOrientation::OriginAtBottom;
    cfg.interaction.chrome_offset_y = 50;
    let mut s = ViewerSession::new(&cfg, EventController::new()).unwrap();
    let job = single(s.start(now));
    s.on_completion(ok(job, bitmap(40, 512, ViewMode::Online)), now);

    // 20 px below the header band is row 10 from the top, address index 245.
    let hover = s.hover(ViewKind::Origin, PixelPos::new(4, 70)).unwrap();
    assert_eq!(lookup_of(&hover), (245, 2, LookupPurpose::Hover));
    s.on_completion(answered(hover, "192.168.0.245"), now);

    assert!(s.pointer_down(ViewKind::Origin, PixelPos::new(4, 70)).is_empty());
    // Released in the header band: off the image, so no lookup is needed.
    let job = single(s.pointer_up(Some(PixelPos::new(14, 10))));
    let request = selection_of(&job);
    assert_eq!(request.addresses.low(), &addr("192.168.0.0"));
    assert_eq!(request.addresses.high(), &addr("192.168.0.245"));
    assert_eq!(request.times.first(), TimeIndex::Interval(0));
    assert_eq!(request.times.last(), TimeIndex::Interval(2));
}

#[test]
fn hovering_off_the_image_clears_the_readout() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);

    resolve(&mut s, PixelPos::new(4, 20), "192.168.0.10", now);
    assert!(s.latest_readout().is_some());

    assert!(s.hover(ViewKind::Origin, PixelPos::new(400, 21)).is_none());
    assert!(s.latest_readout().is_none());
    // The row itself stays known.
    assert_eq!(s.readouts().len(), 1);
}

#[test]
fn stale_hover_answer_still_fills_the_row_cache() {
    let now = Instant::now();
    let mut s = loaded(ResponseOrdering::LatestIssued, now);
    let rx = s.events().subscribe(EventFilter::only(EventKind::STALE_RESPONSE_DROPPED));

    let first = s.hover(ViewKind::Origin, PixelPos::new(4, 20)).unwrap();
    resolve(&mut s, PixelPos::new(4, 40), "192.168.0.20", now);
    s.on_completion(answered(first, "192.168.0.10"), now);

    assert_eq!(
        s.latest_readout().unwrap().address,
        Some(addr("192.168.0.20"))
    );
    assert_eq!(s.readouts().len(), 2);
    assert_eq!(drain(&rx).len(), 1);
}

#[test]
fn time_last_bounds_the_columns() {
    let now = Instant::now();
    let mut s = session(ResponseOrdering::LatestIssued);
    let job = single(s.start(now));
    s.on_completion(
        ok(
            job,
            Reply::Bitmap(BitmapResponse {
                image: blank_image(40, 512),
                mode: Some(ViewMode::Online),
                interval_range: Some(42),
                time_first: Some(parse_timestamp("2024-03-01 12:00:00").unwrap()),
                time_last: Some(parse_timestamp("2024-03-01 12:09:00").unwrap()),
            }),
        ),
        now,
    );
    let view = s.view(ViewKind::Origin).unwrap();
    assert_eq!(view.time_count(), 10);
    assert_eq!(
        view.time_range().last(),
        TimeIndex::Timestamp(parse_timestamp("2024-03-01 12:09:00").unwrap())
    );
}

#[test]
fn invalid_configuration_is_refused() {
    let mut cfg = config(ResponseOrdering::LatestIssued);
    cfg.bitmap.granularity = 33;
    assert!(ViewerSession::new(&cfg, EventController::new()).is_err());

    let mut cfg = config(ResponseOrdering::LatestIssued);
    cfg.bitmap.last_ip = "::1".to_string();
    assert!(matches!(
        ViewerSession::new(&cfg, EventController::new()),
        Err(ViewerError::VersionMismatch { .. })
    ));
}
