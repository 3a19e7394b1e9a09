use super::assert_provisional_invariant;
use super::support::Harness;
use super::support::url;
use crate::frame::FrameOwner;
use crate::ids::DocumentLoaderId;
use crate::ids::FrameId;
use crate::load_request::FrameLoadRequest;
use crate::load_request::OriginDocument;
use crate::types::FrameLoadType;
use pd_net::ResourceRequest;
use pd_net::ResourceResponse;

fn run_script_url(harness: &mut Harness, frame: FrameId, script: &str) {
    let origin = match harness.engine.document(frame) {
        Some(document) => OriginDocument::capture(frame, document),
        None => panic!("{frame} has no document"),
    };
    harness
        .engine
        .load(frame, FrameLoadRequest::new(Some(origin), ResourceRequest::new(url(script))));
}

fn respond_with_refresh(harness: &mut Harness, loader: DocumentLoaderId, refresh: &str) {
    let Some(target) = harness.engine.loader(loader).map(|loader| loader.url().clone()) else {
        panic!("{loader} missing");
    };
    let mut response = ResourceResponse::new(target, "text/html");
    if let Err(error) = response.headers.set("Refresh", refresh) {
        panic!("{error}");
    }
    harness.respond(loader, response);
    harness.engine.did_receive_main_resource_data(loader, b"<p>moving</p>");
}

fn fetched(harness: &Harness) -> bool {
    harness.recorder.events().iter().any(|event| event.starts_with("fetch "))
}

#[test]
fn initial_document_access_is_reported_once_from_a_task() {
    let mut harness = Harness::new();
    let main = harness.main;
    let child = match harness.engine.create_child_frame(main, FrameOwner::iframe("blank"), None) {
        Ok(child) => child,
        Err(error) => panic!("{error}"),
    };
    harness.recorder.clear();

    harness.engine.did_access_initial_document(main);
    harness.engine.did_access_initial_document(main);
    harness.engine.did_access_initial_document(child);
    assert_eq!(harness.recorder.count("access_initial frame#1"), 0);

    harness.engine.run_pending_tasks();
    assert_eq!(harness.recorder.count("access_initial frame#1"), 1);
    assert_eq!(harness.recorder.count(&format!("access_initial {child}")), 0);

    harness.engine.did_access_initial_document(main);
    harness.engine.run_pending_tasks();
    assert_eq!(harness.recorder.count("access_initial frame#1"), 1);
}

#[test]
fn handled_javascript_url_keeps_the_document() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.load_fully(main, "http://a/1");
    harness.recorder.clear();

    run_script_url(&mut harness, main, "javascript:void(0)");

    assert_eq!(harness.recorder.count("javascript frame#1 javascript:void(0)"), 1);
    assert!(harness.provisional(main).is_none());
    assert_eq!(harness.committed(main), Some(loader));
    assert_eq!(harness.document_url(main).as_deref(), Some("http://a/1"));
    assert!(!fetched(&harness));
    assert_eq!(harness.back_forward_urls(), vec!["http://a/1".to_owned()]);
}

#[test]
fn javascript_url_result_replaces_the_document_in_place() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.load_fully(main, "http://a/1");
    harness.recorder.clear();
    *harness.recorder.javascript_result.borrow_mut() = Some("<p>from script</p>".to_owned());

    run_script_url(&mut harness, main, "javascript:render()");

    assert_eq!(harness.recorder.count("javascript frame#1 javascript:render()"), 1);
    assert!(!fetched(&harness));
    assert!(harness.provisional(main).is_none());
    assert!(harness.committed(main).is_some_and(|committed| committed != loader));
    assert_eq!(
        harness.engine.frame(main).map(|frame| frame.loader().load_type()),
        Some(FrameLoadType::RedirectLockedBackForward)
    );
    assert_eq!(harness.document_url(main).as_deref(), Some("http://a/1"));
    assert_eq!(
        harness.engine.document(main).map(|document| document.text().to_owned()).as_deref(),
        Some("<p>from script</p>")
    );
    assert_eq!(harness.back_forward_urls(), vec!["http://a/1".to_owned()]);
    assert!(harness.is_complete(main));
    assert_provisional_invariant(&harness);
}

#[test]
fn refresh_header_navigates_after_its_delay() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.navigate(main, "http://a/");
    respond_with_refresh(&mut harness, loader, "1; url=http://a/next");

    harness.engine.advance_time(5000);
    assert_eq!(harness.recorder.count("fetch frame#1 http://a/next"), 0);

    harness.finish(loader);
    harness.engine.run_pending_tasks();
    assert!(harness.is_complete(main));
    harness.engine.advance_time(999);
    assert_eq!(harness.recorder.count("fetch frame#1 http://a/next"), 0);
    assert!(harness.provisional(main).is_none());

    harness.engine.advance_time(1);
    assert_eq!(harness.recorder.count("fetch frame#1 http://a/next"), 1);
    assert!(harness.provisional(main).is_some());
    assert_provisional_invariant(&harness);
}

#[test]
fn framed_refresh_waits_for_the_parent_to_complete() {
    let mut harness = Harness::new();
    let main = harness.main;
    let loader = harness.navigate(main, "http://a/");
    harness.commit(loader);
    let child = match harness
        .engine
        .create_child_frame(main, FrameOwner::iframe("ticker"), Some(url("http://b/")))
    {
        Ok(child) => child,
        Err(error) => panic!("{error}"),
    };
    let Some(child_loader) = harness.provisional(child) else {
        panic!("{child} did not start loading");
    };
    respond_with_refresh(&mut harness, child_loader, "0; url=http://b/next");
    harness.finish(child_loader);
    harness.engine.advance_time(1000);

    assert!(harness.is_complete(child));
    assert!(!harness.is_complete(main));
    assert_eq!(harness.recorder.count(&format!("fetch {child} http://b/next")), 0);

    harness.finish(loader);
    harness.engine.run_pending_tasks();
    assert_eq!(harness.recorder.count(&format!("fetch {child} http://b/next")), 1);
    assert_eq!(harness.recorder.count("fetch frame#1 http://b/next"), 0);
    assert_provisional_invariant(&harness);
}
