// # Capture Module
//
// Frame sources for the relay. The network camera source needs GStreamer
// and is only built with the `gstreamer-io` feature.

#[cfg(feature = "gstreamer-io")]
pub mod ip_camera;

#[cfg(feature = "gstreamer-io")]
pub use ip_camera::IpCameraSource;
