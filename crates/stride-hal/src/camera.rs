//! Generic `CaptureDevice` trait and supporting types for image-capture
//! hardware.
//!
//! Capture is async because real devices may take a long time (or never
//! return at all); callers are expected to wrap [`CaptureDevice::capture`]
//! in a hard deadline.

use async_trait::async_trait;
use stride_types::StrideError;

/// A single encoded frame returned by a capture device.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Encoded image bytes (JPEG).
    pub data: Vec<u8>,
}

/// Whether a capture device can currently accept a capture request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Permission granted and the device is idle.
    Ready,
    /// The device exists but cannot capture right now (not mounted, in use by
    /// another surface, warming up).
    Busy,
    /// The user has not granted camera permission.
    PermissionDenied,
}

/// A camera or image-capture device.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Stable identifier for this camera, e.g. `"rear_camera"`.
    fn id(&self) -> &str;

    /// Current availability of the device.
    fn status(&self) -> DeviceStatus;

    /// Capture and return one frame encoded at `quality` (0.0–1.0).
    ///
    /// # Errors
    ///
    /// Returns [`StrideError::HardwareFault`] if the frame cannot be captured
    /// or [`StrideError::PermissionDenied`] if access was revoked.
    async fn capture(&self, quality: f32) -> Result<CameraFrame, StrideError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    #[async_trait]
    impl CaptureDevice for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn status(&self) -> DeviceStatus {
            DeviceStatus::Ready
        }

        async fn capture(&self, _quality: f32) -> Result<CameraFrame, StrideError> {
            Ok(CameraFrame {
                width: 2,
                height: 2,
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            })
        }
    }

    #[tokio::test]
    async fn mock_camera_capture() {
        let cam = MockCamera {
            id: "rear_camera".to_string(),
        };
        assert_eq!(cam.id(), "rear_camera");
        assert_eq!(cam.status(), DeviceStatus::Ready);
        let frame = cam.capture(0.5).await.unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.data.len(), 4);
    }
}
