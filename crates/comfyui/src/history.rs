//! Interpretation of `/history/{prompt_id}` responses.
//!
//! The history endpoint returns `{}` while a prompt is queued or
//! running, and `{"<prompt_id>": {"outputs": {...}, "status": {...}}}`
//! once it has finished. Each output node lists the images it saved.

use serde::Deserialize;

/// Reference to one image saved by a finished prompt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    /// Backend-local filename, unique per job.
    pub filename: String,
    #[serde(default)]
    pub subfolder: Option<String>,
    /// Storage class on the backend (`output`, `temp`, ...).
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Where a submitted prompt stands according to its history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Not in history yet, or in history without any image output.
    Pending,
    /// Finished with at least one image.
    Ready(ImageRef),
    /// The backend reported an execution error for this prompt.
    Failed(String),
}

/// Classify a history response for `prompt_id`.
///
/// Output nodes are scanned in the order the backend listed them and
/// the first image of the first node with a non-empty `images` list
/// wins. An error status only counts when no image was produced.
pub fn job_state(history: &serde_json::Value, prompt_id: &str) -> JobState {
    let Some(entry) = history.get(prompt_id) else {
        return JobState::Pending;
    };

    if let Some(image) = first_output_image(entry) {
        return JobState::Ready(image);
    }

    let status = entry.get("status");
    let status_str = status
        .and_then(|s| s.get("status_str"))
        .and_then(|s| s.as_str());
    if status_str == Some("error") {
        return JobState::Failed(execution_error_message(status));
    }

    JobState::Pending
}

/// First image across all output nodes of one history entry.
fn first_output_image(entry: &serde_json::Value) -> Option<ImageRef> {
    let outputs = entry.get("outputs")?.as_object()?;
    outputs.values().find_map(|node| {
        node.get("images")?
            .as_array()?
            .iter()
            .find_map(|img| serde_json::from_value::<ImageRef>(img.clone()).ok())
    })
}

/// Pull the exception message out of an error status, if present.
///
/// ComfyUI reports errors as `messages: [["execution_error", {...}], ...]`.
fn execution_error_message(status: Option<&serde_json::Value>) -> String {
    status
        .and_then(|s| s.get("messages"))
        .and_then(|m| m.as_array())
        .and_then(|messages| {
            messages.iter().find_map(|msg| {
                let pair = msg.as_array()?;
                if pair.first()?.as_str()? != "execution_error" {
                    return None;
                }
                pair.get(1)?
                    .get("exception_message")?
                    .as_str()
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| "execution failed".to_string())
}
