use serde::{Deserialize, Serialize};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// One candidate way of requesting camera access. Profiles are tried in
/// order, least specific first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraintProfile {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<FacingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl CaptureConstraintProfile {
    /// Any camera.
    pub fn basic() -> Self {
        Self {
            name: "basic".to_string(),
            facing: None,
            resolution: None,
        }
    }

    pub fn rear_camera() -> Self {
        Self {
            name: "rear-camera".to_string(),
            facing: Some(FacingMode::Environment),
            resolution: None,
        }
    }

    pub fn rear_camera_at(resolution: Resolution) -> Self {
        Self {
            name: "rear-camera-hd".to_string(),
            facing: Some(FacingMode::Environment),
            resolution: Some(resolution),
        }
    }

    /// Default escalation ladder: basic, rear camera, rear camera at the
    /// target resolution.
    pub fn default_ladder(target: Resolution) -> Vec<Self> {
        vec![
            Self::basic(),
            Self::rear_camera(),
            Self::rear_camera_at(target),
        ]
    }

    /// getUserMedia-style constraints object for web hosts.
    pub fn to_constraints(&self) -> serde_json::Value {
        if self.facing.is_none() && self.resolution.is_none() {
            return serde_json::json!({ "video": true, "audio": false });
        }

        let mut video = serde_json::Map::new();
        if let Some(facing) = self.facing {
            video.insert("facingMode".to_string(), serde_json::json!(facing));
        }
        if let Some(res) = self.resolution {
            video.insert("width".to_string(), serde_json::json!({ "ideal": res.width }));
            video.insert("height".to_string(), serde_json::json!({ "ideal": res.height }));
        }

        serde_json::json!({ "video": video, "audio": false })
    }
}

/// Playback flags applied to the video sink before a stream is attached.
/// All three are needed on mobile browsers to avoid fullscreen takeover and
/// autoplay blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    pub inline: bool,
    pub muted: bool,
    pub autoplay: bool,
}

impl PlaybackOptions {
    pub fn inline_muted_autoplay() -> Self {
        Self {
            inline: true,
            muted: true,
            autoplay: true,
        }
    }
}

/// Bounded retry: fixed number of attempts with a fixed delay in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_order() {
        let ladder = CaptureConstraintProfile::default_ladder(Resolution {
            width: 1280,
            height: 720,
        });
        let names: Vec<_> = ladder.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["basic", "rear-camera", "rear-camera-hd"]);
        assert!(ladder[0].facing.is_none());
        assert_eq!(ladder[2].resolution.unwrap().width, 1280);
    }

    #[test]
    fn test_basic_constraints() {
        let constraints = CaptureConstraintProfile::basic().to_constraints();
        assert_eq!(constraints["video"], true);
        assert_eq!(constraints["audio"], false);
    }

    #[test]
    fn test_rear_camera_hd_constraints() {
        let profile = CaptureConstraintProfile::rear_camera_at(Resolution {
            width: 1920,
            height: 1080,
        });
        let constraints = profile.to_constraints();
        assert_eq!(constraints["video"]["facingMode"], "environment");
        assert_eq!(constraints["video"]["width"]["ideal"], 1920);
        assert_eq!(constraints["video"]["height"]["ideal"], 1080);
    }

    #[test]
    fn test_retry_policy() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay_ms: 10,
        };
        assert!(policy.has_attempt_after(1));
        assert!(policy.has_attempt_after(2));
        assert!(!policy.has_attempt_after(3));
    }
}
