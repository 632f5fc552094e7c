//! Text-to-image job graph.
//!
//! Builds the API-format workflow submitted to `/prompt`: checkpoint
//! loader, positive and negative CLIP encoders, an empty latent, one
//! KSampler, VAE decode, and a SaveImage node. Only the prompt, the
//! checkpoint, and the seed vary between submissions.

use serde_json::json;

/// Output width in pixels.
pub const IMAGE_WIDTH: u32 = 1024;
/// Output height in pixels.
pub const IMAGE_HEIGHT: u32 = 1024;
/// Sampler steps (tuned for distilled few-step checkpoints).
pub const SAMPLER_STEPS: u32 = 4;
pub const SAMPLER_CFG: f64 = 1.0;
pub const SAMPLER_NAME: &str = "euler";
pub const SCHEDULER: &str = "simple";
pub const DENOISE: f64 = 1.0;
/// Prefix of files written by the SaveImage node.
pub const FILENAME_PREFIX: &str = "ComfyUI";

/// Node ID of the SaveImage node whose output is delivered.
pub const SAVE_IMAGE_NODE: &str = "9";

/// Inputs that vary per job.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowParams {
    /// Positive conditioning text.
    pub prompt: String,
    /// Negative conditioning text (always empty for bot requests).
    pub negative_prompt: String,
    pub checkpoint: String,
    pub seed: u64,
    pub width: u32,
    pub height: u32,
}

impl WorkflowParams {
    /// Parameters with the fixed resolution and an empty negative prompt.
    pub fn new(prompt: impl Into<String>, checkpoint: impl Into<String>, seed: u64) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: String::new(),
            checkpoint: checkpoint.into(),
            seed,
            width: IMAGE_WIDTH,
            height: IMAGE_HEIGHT,
        }
    }
}

/// Build the API-format workflow JSON for one job.
pub fn build_workflow(params: &WorkflowParams) -> serde_json::Value {
    json!({
        "6": {
            "inputs": {
                "text": params.prompt,
                "clip": ["30", 1]
            },
            "class_type": "CLIPTextEncode",
            "_meta": {"title": "CLIP Text Encode (Positive Prompt)"}
        },
        "8": {
            "inputs": {
                "samples": ["31", 0],
                "vae": ["30", 2]
            },
            "class_type": "VAEDecode",
            "_meta": {"title": "VAE Decode"}
        },
        SAVE_IMAGE_NODE: {
            "inputs": {
                "filename_prefix": FILENAME_PREFIX,
                "images": ["8", 0]
            },
            "class_type": "SaveImage",
            "_meta": {"title": "Save Image"}
        },
        "27": {
            "inputs": {
                "width": params.width,
                "height": params.height,
                "batch_size": 1
            },
            "class_type": "EmptySD3LatentImage",
            "_meta": {"title": "EmptySD3LatentImage"}
        },
        "30": {
            "inputs": {"ckpt_name": params.checkpoint},
            "class_type": "CheckpointLoaderSimple",
            "_meta": {"title": "Load Checkpoint"}
        },
        "31": {
            "inputs": {
                "seed": params.seed,
                "steps": SAMPLER_STEPS,
                "cfg": SAMPLER_CFG,
                "sampler_name": SAMPLER_NAME,
                "scheduler": SCHEDULER,
                "denoise": DENOISE,
                "model": ["30", 0],
                "positive": ["6", 0],
                "negative": ["33", 0],
                "latent_image": ["27", 0]
            },
            "class_type": "KSampler",
            "_meta": {"title": "KSampler"}
        },
        "33": {
            "inputs": {
                "text": params.negative_prompt,
                "clip": ["30", 1]
            },
            "class_type": "CLIPTextEncode",
            "_meta": {"title": "CLIP Text Encode (Negative Prompt)"}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        build_workflow(&WorkflowParams::new("a cat on a windowsill", "flux.safetensors", 1234))
    }

    #[test]
    fn positive_prompt_is_injected() {
        assert_eq!(sample()["6"]["inputs"]["text"], "a cat on a windowsill");
    }

    #[test]
    fn negative_prompt_is_empty() {
        assert_eq!(sample()["33"]["inputs"]["text"], "");
    }

    #[test]
    fn checkpoint_and_seed_are_injected() {
        let wf = sample();
        assert_eq!(wf["30"]["inputs"]["ckpt_name"], "flux.safetensors");
        assert_eq!(wf["31"]["inputs"]["seed"], 1234);
    }

    #[test]
    fn fixed_resolution_and_sampler() {
        let wf = sample();
        assert_eq!(wf["27"]["inputs"]["width"], IMAGE_WIDTH);
        assert_eq!(wf["27"]["inputs"]["height"], IMAGE_HEIGHT);
        assert_eq!(wf["31"]["inputs"]["steps"], SAMPLER_STEPS);
        assert_eq!(wf["31"]["inputs"]["sampler_name"], "euler");
    }

    #[test]
    fn save_node_feeds_from_decoder() {
        let wf = sample();
        assert_eq!(wf[SAVE_IMAGE_NODE]["class_type"], "SaveImage");
        assert_eq!(wf[SAVE_IMAGE_NODE]["inputs"]["images"], json!(["8", 0]));
    }
}
