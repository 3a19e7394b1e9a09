use super::assert_bottom_up_completion;
use super::assert_provisional_invariant;
use super::support::Harness;
use super::support::url;
use crate::frame::FrameOwner;
use crate::ids::FrameId;
use pd_net::ResourceError;

fn add_child(harness: &mut Harness, parent: FrameId, name: &str, target: &str) -> FrameId {
    match harness
        .engine
        .create_child_frame(parent, FrameOwner::iframe(name), Some(url(target)))
    {
        Ok(child) => child,
        Err(error) => panic!("{error}"),
    }
}

#[test]
fn parent_completes_after_its_children() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.navigate(main, "http://a/");
    harness.commit(loader);
    let child = add_child(&mut harness, main, "inner", "http://b/");
    let Some(child_loader) = harness.provisional(child) else {
        panic!("{child} did not start loading");
    };

    harness.finish(loader);
    assert!(!harness.is_complete(main));
    assert_eq!(harness.recorder.count("load_event frame#1"), 0);
    assert_eq!(harness.recorder.count("finish_load frame#1"), 0);
    assert_bottom_up_completion(&harness);

    harness.commit(child_loader);
    assert_provisional_invariant(&harness);
    harness.finish(child_loader);
    harness.engine.run_pending_tasks();

    assert!(harness.is_complete(child));
    assert!(harness.is_complete(main));
    assert_bottom_up_completion(&harness);
    let recorder = &harness.recorder;
    assert!(recorder.position("load_event frame#2") < recorder.position("load_event frame#1"));
    assert!(recorder.position("finish_load frame#2") < recorder.position("finish_load frame#1"));
    assert_eq!(recorder.count("finish_load frame#1"), 1);
}

#[test]
fn check_completed_is_idempotent() {
    let mut harness = Harness::new();
    let main = harness.main;
    harness.load_fully(main, "http://a/");
    assert_eq!(harness.recorder.count("load_event frame#1"), 1);

    harness.engine.check_completed(main);
    harness.engine.check_load_complete(main);
    assert_eq!(harness.recorder.count("load_event frame#1"), 1);
    assert_eq!(harness.recorder.count("finish_load frame#1"), 1);
}

#[test]
fn pending_subresources_hold_the_load_event() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.navigate(main, "http://a/");
    harness.commit(loader);
    if let Some(document) = harness.engine.document_mut(main) {
        document.pending_subresources = 1;
    }
    harness.finish(loader);
    assert!(!harness.is_complete(main));
    assert!(harness.engine.is_loading(main));
    assert_eq!(harness.engine.num_pending_or_loading_requests(main, true), 1);

    if let Some(document) = harness.engine.document_mut(main) {
        document.pending_subresources = 0;
    }
    harness.engine.load_done(main);
    assert!(harness.is_complete(main));
    assert_eq!(harness.recorder.count("load_event frame#1"), 1);
}

#[test]
fn progress_spans_the_whole_page_load() {
    let mut harness = Harness::new();
    let main = harness.main;
    harness.load_fully(main, "http://a/");
    let recorder = &harness.recorder;
    assert_eq!(recorder.count("progress_started frame#1"), 1);
    assert_eq!(recorder.count("progress_finished frame#1"), 1);
    assert!(recorder.position("progress_started frame#1") < recorder.position("start_provisional frame#1"));
}

#[test]
fn failure_after_commit_reports_a_failed_load() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.navigate(main, "http://a/");
    harness.commit(loader);
    harness.engine.did_fail_main_resource(
        loader,
        ResourceError::network(Some(url("http://a/")), "connection reset"),
    );
    harness.engine.run_pending_tasks();
    assert_eq!(harness.recorder.count("fail_load frame#1"), 1);
    assert_eq!(harness.recorder.count("finish_load frame#1"), 0);
    assert!(harness.is_complete(main));
}
