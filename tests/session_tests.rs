mod common;

use common::{build_docx, build_png, field, FakeConverter, Harness};
use docsign_lib::{
    core::{
        geometry::{Corner, PageSize, PixelPoint},
        types::DocumentStatus,
    },
    workflow::{EditingSession, FieldGesture, GestureKind},
};

const PAGE: PageSize = PageSize {
    width: 1000.0,
    height: 1000.0,
};

#[test]
fn click_waits_for_rendered_page() {
    let mut session = EditingSession::new();
    assert!(session.click(1, PixelPoint { x: 500.0, y: 500.0 }).is_none());

    session.set_page_size(1, PAGE);
    let placed = session.click(1, PixelPoint { x: 500.0, y: 500.0 }).expect("placed");
    assert_eq!(placed.page, 1);
    assert!((placed.x_n - 0.5).abs() < 1e-9);
    assert!(session.click(2, PixelPoint { x: 500.0, y: 500.0 }).is_none());
}

#[test]
fn gesture_tracks_total_travel_from_pointer_down() {
    let start = field(1, 0.5, 0.5);
    let mut gesture = FieldGesture::begin(
        GestureKind::Resize(Corner::BottomRight),
        start,
        PixelPoint { x: 640.0, y: 550.0 },
        PAGE,
    );
    gesture.update(PixelPoint { x: 700.0, y: 600.0 });
    let moved = gesture.update(PixelPoint { x: 690.0, y: 570.0 });
    assert!((moved.w_n - 0.33).abs() < 1e-9);
    assert!((moved.h_n - 0.12).abs() < 1e-9);

    let back = gesture.finish(PixelPoint { x: 640.0, y: 550.0 });
    assert_eq!(back, start);
}

#[test]
fn pointer_down_requires_rendered_page() {
    let mut session = EditingSession::new();
    let err = session
        .pointer_down(GestureKind::Drag, field(1, 0.5, 0.5), PixelPoint { x: 0.0, y: 0.0 })
        .expect_err("page unknown");
    assert_eq!(err.code(), "STATE_CONFLICT");
    assert!(session.pointer_move(PixelPoint { x: 10.0, y: 10.0 }).is_none());
    assert!(session.pointer_up(PixelPoint { x: 10.0, y: 10.0 }).is_none());
}

#[test]
fn new_gesture_supersedes_the_previous_one() {
    let mut session = EditingSession::new();
    session.set_page_size(1, PAGE);
    session
        .pointer_down(GestureKind::Drag, field(1, 0.5, 0.5), PixelPoint { x: 0.0, y: 0.0 })
        .expect("first gesture");
    session.pointer_move(PixelPoint { x: 100.0, y: 0.0 });

    session
        .pointer_down(
            GestureKind::Resize(Corner::TopLeft),
            field(1, 0.3, 0.3),
            PixelPoint { x: 0.0, y: 0.0 },
        )
        .expect("second gesture");
    assert_eq!(
        session.gesture().map(FieldGesture::kind),
        Some(GestureKind::Resize(Corner::TopLeft))
    );
    let finished = session.pointer_up(PixelPoint { x: 0.0, y: 0.0 }).expect("finished");
    assert_eq!(finished, field(1, 0.3, 0.3));
    assert!(session.gesture().is_none());
}

#[tokio::test]
async fn drag_persists_only_on_pointer_up() {
    let harness = Harness::new(FakeConverter::letter());
    harness
        .service
        .submit_upload("contract.docx", build_docx(&["x"]))
        .await
        .expect("upload");
    let placed = harness.service.place_field(field(1, 0.5, 0.5)).await.expect("place");
    let start = placed.signature_field.expect("field");

    let mut session = EditingSession::new();
    session.set_page_size(1, PAGE);
    session
        .pointer_down(GestureKind::Drag, start, PixelPoint { x: 500.0, y: 500.0 })
        .expect("down");

    let writes = harness.meta.write_count();
    for step in 1..=20 {
        let live = session
            .pointer_move(PixelPoint {
                x: 500.0 + step as f64 * 5.0,
                y: 500.0 - step as f64 * 5.0,
            })
            .expect("gesture active");
        assert!((live.x_n - (0.5 + step as f64 * 0.005)).abs() < 1e-9);
    }
    assert_eq!(harness.meta.write_count(), writes, "moves are not persisted");

    let finished = session.pointer_up(PixelPoint { x: 600.0, y: 400.0 }).expect("up");
    let stored = harness.service.place_field(finished).await.expect("persist");
    assert_eq!(harness.meta.write_count(), writes + 1);
    let field = stored.signature_field.expect("field");
    assert!((field.x_n - 0.6).abs() < 1e-9);
    assert!((field.y_n - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn temporary_signature_follows_field_and_finalizes() {
    let harness = Harness::new(FakeConverter::letter());
    harness
        .service
        .submit_upload("contract.docx", build_docx(&["x"]))
        .await
        .expect("upload");
    harness.service.place_field(field(1, 0.5, 0.5)).await.expect("place");

    let mut session = EditingSession::new();
    session.set_page_size(1, PAGE);
    session
        .attach_signature(build_png(12, 6), field(1, 0.5, 0.5))
        .expect("attach");

    let moved = session.click(1, PixelPoint { x: 300.0, y: 700.0 }).expect("re-placed");
    assert_eq!(session.temporary().map(|t| t.position), Some(moved));

    let signed = session.finalize(&harness.service).await.expect("finalize");
    assert_eq!(signed.status, DocumentStatus::Signed);
    assert_eq!(signed.signature_field, Some(moved));
    assert!(session.temporary().is_none());
}

#[tokio::test]
async fn failed_finalize_keeps_temporary_signature() {
    let harness = Harness::new(FakeConverter::letter());
    let mut session = EditingSession::new();
    session
        .attach_signature(build_png(4, 4), field(1, 0.5, 0.5))
        .expect("attach");

    let err = session.finalize(&harness.service).await.expect_err("nothing uploaded");
    assert_eq!(err.code(), "STATE_CONFLICT");
    assert!(session.temporary().is_some());

    assert!(session.discard_signature());
    assert!(!session.discard_signature());
    let err = session.finalize(&harness.service).await.expect_err("nothing to finalize");
    assert_eq!(err.code(), "STATE_CONFLICT");
}

#[test]
fn attach_rejects_bad_inputs_and_reset_forgets_everything() {
    let mut session = EditingSession::new();
    assert!(session.attach_signature(b"not a png".to_vec(), field(1, 0.5, 0.5)).is_err());
    assert!(session.attach_signature(build_png(2, 2), field(1, 0.01, 0.5)).is_err());

    session.set_page_size(1, PAGE);
    session
        .attach_signature(build_png(2, 2), field(1, 0.5, 0.5))
        .expect("attach");
    session.reset();
    assert!(session.temporary().is_none());
    assert!(session.page_size(1).is_none());
}
