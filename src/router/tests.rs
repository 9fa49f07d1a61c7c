use super::*;
use crate::env;
use crate::service::types::{Artifact, GenerationError, OperationKind, UpscaleFactor};

fn image(tag: &str) -> Artifact {
    Artifact::new(tag, env::test::TEST_MEDIA_TYPE)
}

fn state(staged: usize, mask: bool, loaded: bool, instruction: &str) -> EditingState {
    EditingState {
        staged_images: staged,
        mask_active: mask,
        artifact_loaded: loaded,
        instruction: instruction.to_string(),
        tool: None,
    }
}

#[test]
fn test_no_artifact_routes_to_generate() {
    let router = RequestRouter::default();
    let plan = router.route(&state(0, false, false, "a lighthouse at dusk"));

    assert_eq!(plan.kind, OperationKind::Generate);
    assert!(!plan.metered);
}

#[test]
fn test_loaded_artifact_routes_to_edit() {
    let router = RequestRouter::default();
    let plan = router.route(&state(0, false, true, "make the sky purple"));
    assert_eq!(plan.kind, OperationKind::Edit);
}

#[test]
fn test_mask_on_loaded_artifact_routes_to_inpaint() {
    let router = RequestRouter::default();
    assert_eq!(
        router.route(&state(0, true, true, "replace with a cat")).kind,
        OperationKind::Inpaint
    );
    // A mask without anything loaded cannot be inpainted.
    assert_eq!(
        router.route(&state(0, true, false, "a cat")).kind,
        OperationKind::Generate
    );
}

#[test]
fn test_merge_intent_with_multiple_images_routes_to_combine() {
    let router = RequestRouter::default();

    assert_eq!(
        router
            .route(&state(2, false, false, "Merge these two portraits"))
            .kind,
        OperationKind::Combine
    );
    // Combine wins over inpaint when both would match.
    assert_eq!(
        router.route(&state(3, true, true, "blend them together")).kind,
        OperationKind::Combine
    );
}

#[test]
fn test_merge_intent_needs_two_images_and_whole_words() {
    let router = RequestRouter::default();

    assert_eq!(
        router.route(&state(1, false, true, "merge this")).kind,
        OperationKind::Edit
    );
    assert_eq!(
        router.route(&state(2, false, false, "a mixer in a kitchen")).kind,
        OperationKind::Generate
    );
    assert_eq!(
        router.route(&state(2, false, true, "add a hat")).kind,
        OperationKind::Edit
    );
}

#[test]
fn test_tool_action_overrides_everything() {
    let router = RequestRouter::default();
    let tools = [
        (ToolAction::Upscale, OperationKind::Upscale),
        (ToolAction::Refine, OperationKind::Refine),
        (ToolAction::Reframe, OperationKind::Reframe),
        (ToolAction::Animate, OperationKind::Animate),
    ];

    for (tool, expected) in tools {
        let mut editing = state(3, true, true, "combine everything");
        editing.tool = Some(tool);
        let plan = router.route(&editing);
        assert_eq!(plan.kind, expected);
        assert_eq!(plan.metered, expected == OperationKind::Animate);
    }
}

#[test]
fn test_custom_merge_keywords() {
    let router = RequestRouter::new(RoutingConfig {
        merge_keywords: vec!["kombiniere".to_string(), "  ".to_string()],
        max_combine_images: 2,
    })
    .unwrap();

    assert!(router.has_merge_intent("Bitte KOMBINIERE die Bilder"));
    assert!(!router.has_merge_intent("merge them"));
}

#[test]
fn test_empty_keyword_list_disables_combine() {
    let router = RequestRouter::new(RoutingConfig {
        merge_keywords: Vec::new(),
        max_combine_images: 4,
    })
    .unwrap();

    assert_eq!(
        router.route(&state(2, false, false, "combine them")).kind,
        OperationKind::Generate
    );
}

#[test]
fn test_tool_names_parse() {
    assert_eq!(ToolAction::parse("Upscale"), Some(ToolAction::Upscale));
    assert_eq!(ToolAction::parse(" video "), Some(ToolAction::Animate));
    assert_eq!(ToolAction::parse("sharpen"), None);
}

#[test]
fn test_inpaint_without_mask_fails_before_any_call() {
    let plan = OperationPlan::new(OperationKind::Inpaint);
    let inputs = RequestInputs {
        instruction: "remove the car".to_string(),
        current_artifact: Some(image("base")),
        ..Default::default()
    };

    let result = build_request(&plan, inputs, &RoutingConfig::default());
    assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
}

#[test]
fn test_inpaint_request_carries_artifact_and_mask() {
    let plan = OperationPlan::new(OperationKind::Inpaint);
    let inputs = RequestInputs {
        instruction: "remove the car".to_string(),
        current_artifact: Some(image("base")),
        mask: Some(image("mask")),
        ..Default::default()
    };

    let request = build_request(&plan, inputs, &RoutingConfig::default()).unwrap();
    assert_eq!(request.images, vec![image("base")]);
    assert_eq!(request.mask, Some(image("mask")));
    assert!(request.settings.seed.is_some());
}

#[test]
fn test_combine_caps_image_count() {
    let plan = OperationPlan::new(OperationKind::Combine);
    let inputs = RequestInputs {
        instruction: "combine".to_string(),
        staged_images: (0..6).map(|i| image(&format!("img{}", i))).collect(),
        ..Default::default()
    };
    let config = RoutingConfig {
        max_combine_images: 3,
        ..Default::default()
    };

    let request = build_request(&plan, inputs, &config).unwrap();
    assert_eq!(request.images.len(), 3);
    assert_eq!(request.images[0], image("img0"));
}

#[test]
fn test_edit_without_artifact_is_invalid() {
    let plan = OperationPlan::new(OperationKind::Edit);
    let inputs = RequestInputs {
        instruction: "brighter".to_string(),
        ..Default::default()
    };
    assert!(build_request(&plan, inputs, &RoutingConfig::default()).is_err());
}

#[test]
fn test_upscale_allows_blank_instruction_and_defaults_factor() {
    let plan = OperationPlan::new(OperationKind::Upscale);
    let inputs = RequestInputs {
        instruction: "  ".to_string(),
        current_artifact: Some(image("base")),
        ..Default::default()
    };

    let request = build_request(&plan, inputs, &RoutingConfig::default()).unwrap();
    assert_eq!(request.settings.resolution, Some(UpscaleFactor::X2));
    assert!(request.instruction.is_empty());
}

#[test]
fn test_generate_requires_instruction() {
    let plan = OperationPlan::new(OperationKind::Generate);
    let result = build_request(&plan, RequestInputs::default(), &RoutingConfig::default());
    assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
}

#[test]
fn test_explicit_seed_is_kept() {
    let plan = OperationPlan::new(OperationKind::Generate);
    let mut inputs = RequestInputs {
        instruction: "a fox".to_string(),
        ..Default::default()
    };
    inputs.settings.seed = Some(42);

    let request = build_request(&plan, inputs, &RoutingConfig::default()).unwrap();
    assert_eq!(request.settings.seed, Some(42));
    assert!(request.images.is_empty());
}
