use crate::router::types::{OperationPlan, RequestInputs, RoutingConfig};
use crate::service::types::{GenerationError, GenerationRequest, OperationKind, UpscaleFactor};
use tracing::warn;

/// Build the request for a routed plan.
///
/// Fails before any remote call when the plan needs payloads the inputs do
/// not carry (no current artifact for an edit, no mask for an inpaint).
pub fn build_request(
    plan: &OperationPlan,
    inputs: RequestInputs,
    config: &RoutingConfig,
) -> Result<GenerationRequest, GenerationError> {
    let RequestInputs {
        instruction,
        current_artifact,
        staged_images,
        mask,
        mut settings,
    } = inputs;

    let instruction = instruction.trim().to_string();
    if instruction.is_empty() && !allows_blank_instruction(plan.kind) {
        return Err(GenerationError::InvalidRequest(format!(
            "{} needs an instruction",
            plan.kind
        )));
    }

    if settings.seed.is_none() {
        settings.seed = Some(rand::random::<u32>() as u64);
    }

    let mut request = GenerationRequest::new(plan.kind, instruction);

    match plan.kind {
        OperationKind::Generate => {}
        OperationKind::Combine => {
            let mut images = staged_images;
            if images.len() > config.max_combine_images {
                warn!(
                    "Combining only the first {} of {} staged images",
                    config.max_combine_images,
                    images.len()
                );
                images.truncate(config.max_combine_images);
            }
            if images.len() < 2 {
                return Err(GenerationError::InvalidRequest(
                    "combine needs at least two images".to_string(),
                ));
            }
            request.images = images;
        }
        OperationKind::Inpaint => {
            let artifact = require_artifact(plan.kind, current_artifact)?;
            let mask = mask.ok_or_else(|| {
                GenerationError::InvalidRequest("inpaint needs a mask".to_string())
            })?;
            request.images = vec![artifact];
            request.mask = Some(mask);
        }
        OperationKind::Upscale => {
            request.images = vec![require_artifact(plan.kind, current_artifact)?];
            settings.resolution.get_or_insert(UpscaleFactor::X2);
            settings.image_count = 1;
        }
        OperationKind::Edit
        | OperationKind::Refine
        | OperationKind::Reframe
        | OperationKind::Animate => {
            request.images = vec![require_artifact(plan.kind, current_artifact)?];
        }
    }

    request.settings = settings;
    Ok(request)
}

fn allows_blank_instruction(kind: OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::Upscale | OperationKind::Refine | OperationKind::Reframe
    )
}

fn require_artifact(
    kind: OperationKind,
    artifact: Option<crate::service::types::Artifact>,
) -> Result<crate::service::types::Artifact, GenerationError> {
    artifact.ok_or_else(|| {
        GenerationError::InvalidRequest(format!("{} needs a loaded image", kind))
    })
}
