use super::{Mixer, QueueMode};
use crate::{ClipData, Error, WrapMode};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-6,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn mixer_with(names: &[&str]) -> Mixer {
    let mut mixer = Mixer::default();
    for name in names {
        let clip = ClipData::new(*name, 2.0).into_ref();
        mixer.add_clip(name, &clip).unwrap();
    }
    mixer
}

#[test]
fn handle_goes_stale_when_its_index_is_reused() {
    let mut mixer = mixer_with(&["A"]);
    let a = mixer.get_state("A").unwrap();
    mixer.remove_clip("A").unwrap();
    assert!(!a.is_valid(&mixer));

    let b = mixer
        .add_clip("B", &ClipData::new("b", 1.0).into_ref())
        .unwrap();
    assert_eq!(b.index(), a.index());
    assert!(!a.is_valid(&mixer));
    assert_eq!(
        a.weight(&mixer),
        Err(Error::InvalidHandle { index: a.index() })
    );
    assert!(a.set_enabled(&mut mixer, true).is_err());
    assert!(!b.enabled(&mixer).unwrap());
}

#[test]
fn handle_survives_unrelated_changes() {
    let mut mixer = mixer_with(&["A", "B"]);
    let a = mixer.get_state("A").unwrap();
    mixer.remove_clip("B").unwrap();
    mixer
        .add_clip("C", &ClipData::new("c", 1.0).into_ref())
        .unwrap();
    mixer.play("A").unwrap();
    assert!(a.is_valid(&mixer));
    assert!(a.enabled(&mixer).unwrap());
}

#[test]
fn rename_keeps_the_handle_and_rejects_taken_names() {
    let mut mixer = mixer_with(&["A", "B"]);
    let a = mixer.get_state("A").unwrap();

    a.set_name(&mut mixer, "Walk").unwrap();
    assert_eq!(a.name(&mixer).unwrap(), "Walk");
    assert!(mixer.get_state("A").is_none());
    assert_eq!(mixer.get_state("Walk"), Some(a));

    let err = a.set_name(&mut mixer, "B").unwrap_err();
    assert_eq!(
        err,
        Error::DuplicateName {
            name: "B".to_string()
        }
    );
    a.set_name(&mut mixer, "Walk").unwrap();
}

#[test]
fn weight_must_be_finite_and_non_negative() {
    let mut mixer = mixer_with(&["A"]);
    let a = mixer.get_state("A").unwrap();
    assert!(matches!(
        a.set_weight(&mut mixer, -0.1),
        Err(Error::InvalidValue { .. })
    ));
    assert!(a.set_weight(&mut mixer, f32::INFINITY).is_err());
    a.set_weight(&mut mixer, 0.25).unwrap();
    assert_approx(a.weight(&mixer).unwrap(), 0.25);
    assert_approx(a.target_weight(&mixer).unwrap(), 0.25);
    assert!(!a.is_fading(&mixer).unwrap());
}

#[test]
fn normalized_time_scales_by_clip_length() {
    let mut mixer = mixer_with(&["A"]);
    let a = mixer.get_state("A").unwrap();
    a.set_time(&mut mixer, 1.0).unwrap();
    assert_approx(a.normalized_time(&mixer).unwrap(), 0.5);

    a.set_normalized_time(&mut mixer, 0.25).unwrap();
    assert_approx(a.time(&mixer).unwrap(), 0.5);

    a.set_speed(&mut mixer, 10.0).unwrap();
    assert_approx(a.normalized_time(&mixer).unwrap(), 0.25);
}

#[test]
fn zero_length_clip_normalizes_by_one() {
    let mut mixer = Mixer::default();
    let h = mixer
        .add_clip("pose", &ClipData::new("pose", 0.0).into_ref())
        .unwrap();
    h.set_time(&mut mixer, 0.5).unwrap();
    assert_approx(h.normalized_time(&mixer).unwrap(), 0.5);
}

#[test]
fn speed_rejects_nan() {
    let mut mixer = mixer_with(&["A"]);
    let a = mixer.get_state("A").unwrap();
    assert_approx(a.speed(&mixer).unwrap(), 1.0);
    assert!(a.set_speed(&mut mixer, f32::NAN).is_err());
    a.set_speed(&mut mixer, -2.0).unwrap();
    assert_approx(a.speed(&mixer).unwrap(), -2.0);
}

#[test]
fn accessors_report_clip_properties() {
    let mut mixer = Mixer::default();
    let clip = ClipData::new("run", 1.5).looping(true).into_ref();
    let h = mixer.add_clip("Run", &clip).unwrap();

    assert_approx(h.length(&mixer).unwrap(), 1.5);
    assert_eq!(h.wrap_mode(&mixer).unwrap(), WrapMode::Loop);
    assert_eq!(h.clip(&mixer).unwrap().name, "run");
    assert!(!h.is_clone(&mixer).unwrap());
    assert_eq!(h.parent(&mixer).unwrap(), None);
}

#[test]
fn clone_points_back_at_its_parent() {
    let mut mixer = mixer_with(&["A"]);
    let a = mixer.get_state("A").unwrap();
    let clone = mixer.play_queued("A", QueueMode::CompleteOthers).unwrap();
    assert!(clone.is_clone(&mixer).unwrap());
    assert_eq!(clone.parent(&mixer).unwrap(), Some(a));

    mixer.remove_clip("A").unwrap();
    let parent = clone.parent(&mixer).unwrap().unwrap();
    assert!(!parent.is_valid(&mixer));
}

#[test]
fn cursor_walks_live_slots_in_order() {
    let mut mixer = mixer_with(&["A", "B", "C"]);
    mixer.remove_clip("B").unwrap();

    let mut cursor = mixer.get_states();
    assert_eq!(cursor.current(&mixer), Err(Error::CursorOutOfRange));

    let mut names = Vec::new();
    while cursor.move_next(&mixer).unwrap() {
        let h = cursor.current(&mixer).unwrap();
        names.push(h.name(&mixer).unwrap().to_string());
    }
    assert_eq!(names, ["A", "C"]);
    assert_eq!(cursor.current(&mixer), Err(Error::CursorOutOfRange));
    assert!(!cursor.move_next(&mixer).unwrap());

    cursor.reset(&mixer).unwrap();
    assert!(cursor.move_next(&mixer).unwrap());
    assert_eq!(cursor.current(&mixer).unwrap().name(&mixer).unwrap(), "A");
}

#[test]
fn cursor_fails_after_structural_change() {
    let mut mixer = mixer_with(&["A"]);
    let mut cursor = mixer.get_states();
    assert!(cursor.move_next(&mixer).unwrap());

    mixer
        .add_clip("B", &ClipData::new("b", 1.0).into_ref())
        .unwrap();
    assert_eq!(cursor.move_next(&mixer), Err(Error::CollectionModified));
    assert_eq!(cursor.current(&mixer), Err(Error::CollectionModified));
    assert_eq!(cursor.reset(&mixer), Err(Error::CollectionModified));
}

#[test]
fn cursor_tolerates_non_structural_changes() {
    let mut mixer = mixer_with(&["A", "B"]);
    let mut cursor = mixer.get_states();
    mixer.play("B").unwrap();
    mixer.get_state("A").unwrap().set_name(&mut mixer, "Z").unwrap();
    mixer.tick(0.1);
    assert!(cursor.move_next(&mixer).unwrap());
}

#[test]
fn states_iterator_matches_clip_count() {
    let mut mixer = mixer_with(&["A", "B"]);
    mixer.play_queued("B", QueueMode::CompleteOthers).unwrap();
    assert_eq!(mixer.states().count(), mixer.clip_count());
    assert_eq!(mixer.clip_count(), 3);
}
