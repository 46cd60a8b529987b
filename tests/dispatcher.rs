use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use activity_viewer::client::{
    BitmapResponse, BitmapService, Dispatcher, FetchRequest, IndexRequest, IndexResponse, Job,
    JobKind, LookupPurpose, Reply, SelectionResponse,
};
use activity_viewer::data::mapper::CellIndex;
use activity_viewer::data::readout::CellColour;
use activity_viewer::data::time::TimeIndex;
use activity_viewer::data::view::ViewKind;
use activity_viewer::data::selection::SelectionRequest;
use activity_viewer::data::view::BitmapType;
use activity_viewer::{Result, ViewerError};

mod common;
use common::{addr, blank_image};

/// Serves a blank bitmap for fetches and fails everything else.
struct FakeBackend;

impl BitmapService for FakeBackend {
    fn fetch_bitmap(&self, request: &FetchRequest) -> Result<BitmapResponse> {
        Ok(BitmapResponse {
            image: blank_image(10 * request.scale, 10 * request.scale),
            mode: None,
            interval_range: None,
            time_first: None,
            time_last: None,
        })
    }

    fn resolve_index(&self, _request: &IndexRequest) -> Result<IndexResponse> {
        Ok(IndexResponse {
            address: None,
            time: None,
            colour: CellColour::Gray,
        })
    }

    fn select_area(&self, _request: &SelectionRequest) -> Result<SelectionResponse> {
        Err(ViewerError::network(Some(500), "select_area returned 500"))
    }
}

/// Holds every fetch until the test lets it go; counts lookups that reach it.
struct GatedBackend {
    gate: Mutex<Receiver<()>>,
    lookups: AtomicUsize,
}

impl GatedBackend {
    fn new() -> (Arc<Self>, Sender<()>) {
        let (open, gate) = mpsc::channel();
        let backend = Arc::new(Self {
            gate: Mutex::new(gate),
            lookups: AtomicUsize::new(0),
        });
        (backend, open)
    }
}

impl BitmapService for GatedBackend {
    fn fetch_bitmap(&self, request: &FetchRequest) -> Result<BitmapResponse> {
        let _ = self.gate.lock().unwrap().recv_timeout(Duration::from_secs(5));
        FakeBackend.fetch_bitmap(request)
    }

    fn resolve_index(&self, request: &IndexRequest) -> Result<IndexResponse> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        FakeBackend.resolve_index(request)
    }

    fn select_area(&self, request: &SelectionRequest) -> Result<SelectionResponse> {
        FakeBackend.select_area(request)
    }
}

fn lookup(seq: u64, purpose: LookupPurpose) -> Job {
    Job {
        seq,
        kind: JobKind::ResolveIndex(IndexRequest {
            view: ViewKind::Origin,
            first_ip: addr("10.0.0.0"),
            first_time: None,
            cell: CellIndex {
                ip_index: seq,
                time_ordinal: 0,
                time: TimeIndex::Interval(0),
            },
            purpose,
        }),
    }
}

fn fetch(seq: u64, scale: u32) -> Job {
    Job {
        seq,
        kind: JobKind::Fetch(FetchRequest {
            bitmap_type: BitmapType::Source,
            scale,
        }),
    }
}

#[test]
fn completions_come_back_with_their_job() {
    let woken = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&woken);
    let dispatcher = Dispatcher::new(Arc::new(FakeBackend)).with_notify(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.submit_all([fetch(1, 1), fetch(2, 3)]);

    let mut seen = Vec::new();
    for _ in 0..2 {
        let completion = dispatcher
            .recv_timeout(Duration::from_secs(5))
            .expect("worker should answer");
        match completion.result {
            Ok(Reply::Bitmap(response)) => seen.push((completion.job.seq, response.image.width)),
            other => panic!("unexpected result {other:?}"),
        }
    }
    seen.sort();
    assert_eq!(seen, vec![(1, 10), (2, 30)]);
    assert!(dispatcher.drain().is_empty());

    // Notification fires after the send, so the last one may still be in flight.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while woken.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(woken.load(Ordering::SeqCst), 2);
}

#[test]
fn service_errors_are_delivered_not_swallowed() {
    let dispatcher = Dispatcher::new(Arc::new(FakeBackend));
    let request = SelectionRequest {
        addresses: common::range("10.0.0.0", "10.0.0.9"),
        times: activity_viewer::data::time::TimeRange::new(
            activity_viewer::data::time::TimeIndex::Interval(0),
            activity_viewer::data::time::TimeIndex::Interval(3),
        ),
        bitmap_type: BitmapType::Source,
        granularity: 32,
    };
    dispatcher.submit(Job {
        seq: 7,
        kind: JobKind::Select(request),
    });

    let completion = dispatcher.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(completion.job.seq, 7);
    assert!(matches!(
        completion.result,
        Err(ViewerError::NetworkFailure { status: Some(500), .. })
    ));
}

#[test]
fn queued_hover_lookups_collapse_to_the_newest() {
    let (backend, open) = GatedBackend::new();
    let dispatcher = Dispatcher::with_workers(Arc::clone(&backend) as Arc<dyn BitmapService>, 1);
    assert_eq!(dispatcher.workers(), 1);

    // The only worker is stuck on the fetch while the pointer sweeps.
    dispatcher.submit(fetch(1, 1));
    dispatcher.submit_all([
        lookup(1, LookupPurpose::Hover),
        lookup(2, LookupPurpose::Corner),
        lookup(3, LookupPurpose::Hover),
        lookup(4, LookupPurpose::Hover),
    ]);
    open.send(()).unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let completion = dispatcher
            .recv_timeout(Duration::from_secs(5))
            .expect("worker should answer");
        seen.push((completion.job.kind.label(), completion.job.seq));
    }
    assert_eq!(
        seen,
        vec![("fetch", 1), ("resolve_index", 2), ("resolve_index", 4)]
    );
    assert!(dispatcher.recv_timeout(Duration::from_millis(100)).is_none());
    assert_eq!(backend.lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn pool_size_is_fixed() {
    let dispatcher = Dispatcher::with_workers(Arc::new(FakeBackend), 2);
    assert_eq!(dispatcher.workers(), 2);
    dispatcher.submit_all((1..=20).map(|seq| fetch(seq, 1)));
    let mut count = 0;
    while count < 20 {
        dispatcher
            .recv_timeout(Duration::from_secs(5))
            .expect("every job should finish");
        count += 1;
    }
    assert!(dispatcher.drain().is_empty());
}
