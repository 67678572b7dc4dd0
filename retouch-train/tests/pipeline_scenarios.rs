mod common;

use common::{EDITED_VALUE, MeanDenoiser, MockData, MockEditor, MockModel, ORIGINAL_VALUE};
use glam::{Affine3A, Vec3};
use ndarray::{Array4, ArrayView3, ArrayView5};
use retouch_match::{MatchError, PointTracker};
use retouch_train::{
    ConfigError, CorrespondenceConfig, CorrespondenceEditor, DataManager, EditAction, EditConfig,
    EditError, EditPhase, EditPipeline, OperatorControl,
};

type MockPipeline = EditPipeline<MockModel, MockData, MockEditor>;

fn pipeline(config: EditConfig, slots: usize) -> MockPipeline {
    EditPipeline::new(
        config,
        MockModel::new(64),
        MockData::new(slots, 64),
        MockEditor::default(),
    )
    .unwrap()
}

fn slot_value(p: &MockPipeline, slot: usize) -> f32 {
    p.data().training_batch().image(slot).unwrap().view()[[0, 0, 0]]
}

#[test]
fn test_bootstrap_step_zero_runs_batched_edit() {
    let mut p = pipeline(EditConfig::default(), 10);
    let out = p.step(0).unwrap();

    assert_eq!(out.decision.phase, EditPhase::Bootstrap);
    assert_eq!(out.decision.action, EditAction::Batched);
    assert_eq!(p.editor().batch_sizes, vec![4]);
    assert_eq!(p.editor().single_calls, 0);
    // Batched edits double the text guidance.
    assert_eq!(p.editor().guidance, vec![15.0]);

    let updated = p.data().training_batch().updated().to_vec();
    assert_eq!(&updated[..4], &[true; 4]);
    assert_eq!(&updated[4..], &[false; 6]);
    assert_eq!(slot_value(&p, 0), EDITED_VALUE);
    assert_eq!(slot_value(&p, 4), ORIGINAL_VALUE);
    assert_eq!(p.cursor().peek(), 4);
}

#[test]
fn test_loss_uses_pre_edit_batch() {
    let mut p = pipeline(EditConfig::default(), 10);
    let out = p.step(0).unwrap();
    assert_eq!(out.model_outputs, 0);
    assert_eq!(out.metrics["psnr"], 20.0);
    assert_eq!(out.losses["rgb_loss"], 1.0 / 20.0);
    assert_eq!(p.model().forward_steps, vec![0]);
}

#[test]
fn test_step_nine_lifts_restriction_and_step_ten_edits_single() {
    let config = EditConfig {
        fast_mode_duration_steps: 0,
        ..Default::default()
    };
    let mut p = pipeline(config, 10);
    p.step(0).unwrap();

    let mut actions = Vec::new();
    for step in 1..=10 {
        actions.push(p.step(step).unwrap().decision.action);
    }
    assert!(actions[..9].iter().all(|a| *a == EditAction::None));
    assert_eq!(actions[9], EditAction::Single);

    let sampling = &p.data().sampling;
    // Step 8 keeps sampling edited slots; step 9 precedes an edit step.
    assert!(sampling[8]);
    assert!(!sampling[9]);
    assert!(sampling[10]);
    assert_eq!(p.editor().single_calls, 1);
    assert_eq!(p.editor().guidance.last(), Some(&7.5));
}

#[test]
fn test_all_slots_updated_falls_back_to_slow_unrestricted() {
    let mut p = pipeline(EditConfig::default(), 4);
    p.step(0).unwrap();
    assert!(p.data().training_batch().all_updated());

    let d = p.step(1).unwrap().decision;
    assert!(d.starvation_fallback);
    assert!(d.fast_window);
    assert_eq!(d.phase, EditPhase::SlowPhase);
    assert!(!d.only_sample_updated);
    assert_eq!(d.action, EditAction::None);

    let d = p.step(200).unwrap().decision;
    assert_eq!(d.action, EditAction::Single);
    assert_eq!(p.editor().batch_sizes, vec![4]);
    assert_eq!(p.editor().single_calls, 1);
}

#[test]
fn test_exactly_one_action_per_step() {
    let mut p = pipeline(EditConfig::default(), 10);
    let mut previous = p.stats();
    for step in 0..900 {
        let out = p.step(step).unwrap();
        let now = p.stats();
        let single = now.single_edits - previous.single_edits;
        let batched = now.batched_edits - previous.batched_edits;
        assert!(single + batched <= 1, "step {step} ran {single} + {batched} edits");
        let expected = match out.decision.action {
            EditAction::None => (0, 0),
            EditAction::Single => (1, 0),
            EditAction::Batched => (0, 1),
        };
        assert_eq!((single, batched), expected);
        previous = now;
    }
    assert_eq!(p.stats().steps, 900);
}

#[test]
fn test_starting_step_fixed_by_first_call() {
    let mut p = pipeline(EditConfig::default(), 10);
    p.step(1000).unwrap();
    assert_eq!(p.scheduler().starting_step().get().unwrap(), 1000);

    let inside = p.step(1599).unwrap().decision;
    let outside = p.step(1600).unwrap().decision;
    assert!(inside.fast_window);
    assert!(!outside.fast_window);
    assert_eq!(p.scheduler().starting_step().get().unwrap(), 1000);
}

#[test]
fn test_batched_edit_before_first_step_is_stale() {
    let mut p = pipeline(EditConfig::default(), 10);
    assert!(matches!(
        p.edit_by_correspondence(),
        Err(EditError::StaleState(_))
    ));
    assert!(!p.data().training_batch().any_updated());
}

#[test]
fn test_edited_output_resampled_to_rendered_resolution() {
    let mut p = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(6, 64),
        MockEditor::with_output_res(60),
    )
    .unwrap();
    p.step(0).unwrap();
    for slot in 0..4 {
        let image = p.data().training_batch().image(slot).unwrap();
        assert_eq!(image.shape(), [64, 64, 3]);
        assert!((image.view()[[63, 0, 1]] - EDITED_VALUE).abs() < 1e-6);
    }
}

#[test]
fn test_scratch_released_every_iteration() {
    let config = EditConfig {
        slow_edit_count: 3,
        fast_mode_duration_steps: 0,
        ..Default::default()
    };
    let mut p = pipeline(config, 10);
    p.step(0).unwrap();
    assert_eq!(p.model().releases, 4);
    p.step(10).unwrap();
    assert_eq!(p.model().releases, 7);
    assert_eq!(p.stats().images_edited, 7);
}

#[test]
fn test_pose_correction_applied_before_render() {
    let mut model = MockModel::new(64);
    model.correction = Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0));
    let mut p = EditPipeline::new(
        EditConfig::default(),
        model,
        MockData::new(10, 64),
        MockEditor::default(),
    )
    .unwrap();
    p.step(0).unwrap();
    let positions = &p.model().rendered_positions;
    assert_eq!(positions.len(), 4);
    for (i, position) in positions.iter().enumerate() {
        assert!(position.abs_diff_eq(Vec3::new(i as f32, 0.0, 5.0), 1e-5));
    }
}

#[test]
fn test_sample_pool_bounds_cursor() {
    let mut p = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(10, 64).with_pool(3),
        MockEditor::default(),
    )
    .unwrap();
    assert_eq!(p.cursor().len(), 3);
    p.step(0).unwrap();
    let updated = p.data().training_batch().updated().to_vec();
    assert_eq!(&updated[..3], &[true; 3]);
    assert!(updated[3..].iter().all(|u| !u));
    assert_eq!(p.cursor().peek(), 1);
}

#[test]
fn test_cursor_range_larger_than_batch_rejected() {
    let oversized_pool = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(3, 64).with_pool(8),
        MockEditor::default(),
    );
    assert!(matches!(
        oversized_pool,
        Err(EditError::Config(ConfigError::CursorRange { range: 8, slots: 3 }))
    ));

    let oversized_dataset = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(3, 64).with_extra_cameras(2),
        MockEditor::default(),
    );
    assert!(matches!(
        oversized_dataset,
        Err(EditError::Config(ConfigError::CursorRange { range: 5, slots: 3 }))
    ));

    // A pool that fits inside the batch still bounds a larger dataset.
    let p = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(3, 64).with_extra_cameras(2).with_pool(3),
        MockEditor::default(),
    )
    .unwrap();
    assert_eq!(p.cursor().len(), 3);
}

#[test]
fn test_original_batch_size_mismatch_rejected() {
    let result = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(4, 64).with_original_slots(3),
        MockEditor::default(),
    );
    assert!(matches!(
        result,
        Err(EditError::Config(ConfigError::SlotMismatch {
            training: 4,
            original: 3
        }))
    ));
}

#[test]
fn test_prompt_change_reencodes_immediately() {
    let mut p = pipeline(EditConfig::default(), 10);
    assert_eq!(p.embedding(), "<don't change the image>");

    p.apply_control(OperatorControl::Prompt("make it autumn".into()))
        .unwrap();
    assert_eq!(p.embedding(), "<make it autumn>");
    assert_eq!(p.config().prompt, "make it autumn");
    assert_eq!(p.editor().prompts.len(), 2);

    assert!(p.set_prompt("").is_err());
    assert_eq!(p.embedding(), "<make it autumn>");
    assert_eq!(p.config().prompt, "make it autumn");
}

#[test]
fn test_guidance_controls() {
    let mut p = pipeline(EditConfig::default(), 10);
    p.apply_control(OperatorControl::GuidanceScale(10.0)).unwrap();
    p.apply_control(OperatorControl::ImageGuidanceScale(2.0))
        .unwrap();
    assert!(p.set_guidance_scale(f32::NAN).is_err());
    assert_eq!(p.config().guidance_scale, 10.0);
    assert_eq!(p.config().image_guidance_scale, 2.0);

    p.step(0).unwrap();
    assert_eq!(p.editor().guidance, vec![20.0]);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let config = EditConfig {
        fast_edit_rate: 0,
        ..Default::default()
    };
    let result = EditPipeline::new(
        config,
        MockModel::new(64),
        MockData::new(10, 64),
        MockEditor::default(),
    );
    assert!(matches!(result, Err(EditError::Config(_))));
}

struct StillTracker;

impl PointTracker for StillTracker {
    fn track(
        &mut self,
        query_points: ArrayView3<'_, f32>,
        frames: ArrayView5<'_, f32>,
        _iterations: usize,
    ) -> Result<Vec<Array4<f32>>, MatchError> {
        let (b, n, _) = query_points.dim();
        let t = frames.dim().1;
        Ok(vec![Array4::from_shape_fn((b, t, n, 2), |(bi, _, p, a)| {
            query_points[[bi, p, a]]
        })])
    }
}

#[test]
fn test_pipeline_with_correspondence_editor() {
    let correspondence = CorrespondenceConfig {
        grid_size: 4,
        latent_downscale: 2,
        group_size: 3,
        ..Default::default()
    };
    let editor =
        CorrespondenceEditor::new(MeanDenoiser::default(), StillTracker, correspondence, 11)
            .unwrap();
    let mut p = EditPipeline::new(
        EditConfig::default(),
        MockModel::new(64),
        MockData::new(8, 64),
        editor,
    )
    .unwrap();

    p.step(0).unwrap();
    assert_eq!(p.editor().denoiser().batches, 1);
    assert_eq!(p.data().training_batch().updated_count(), 4);
    for slot in 0..4 {
        let image = p.data().training_batch().image(slot).unwrap();
        assert_eq!(image.shape(), [64, 64, 3]);
        assert_ne!(image.view()[[0, 0, 0]], ORIGINAL_VALUE);
    }
}
