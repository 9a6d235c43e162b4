//! Configuration types for PDF-to-PPTX conversion.
//!
//! Two layers:
//!
//! * [`RenderConfig`] — the value that travels with every conversion request:
//!   render scale, image encoding and rendering strategy. It is always
//!   normalised through a [`ClampPolicy`] before use; out-of-range values are
//!   clamped and garbage is replaced by defaults, never rejected.
//! * [`ConversionConfig`] — everything else the library entry points need
//!   (password, engine preference, input limit, callbacks, an injected PDF
//!   backend), built via [`ConversionConfigBuilder`].

use crate::progress::ProgressCallback;
use crate::session::CancelToken;
use crate::source::PdfBackend;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Render scale used when the caller supplies none or garbage.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// JPEG quality used when the caller supplies none or garbage.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.82;

/// Largest accepted input, 50 MiB.
pub const MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

// ── Render config ────────────────────────────────────────────────────────

/// How each page is turned into a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Strategy A: the whole page as one picture. (default)
    #[default]
    Image,
    /// Strategy B: a low-resolution background picture plus editable text boxes.
    Hybrid,
}

impl RenderMode {
    /// Parse a mode name; anything unrecognised is [`RenderMode::Image`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "hybrid" | "text" => RenderMode::Hybrid,
            _ => RenderMode::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Image => "image",
            RenderMode::Hybrid => "hybrid",
        }
    }
}

/// Encoding for rendered page images.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "format")]
pub enum ImageEncoding {
    /// Lossless PNG. (default)
    #[default]
    Png,
    /// Lossy JPEG with a quality factor in `[0, 1]`.
    Jpeg { quality: f32 },
}

impl ImageEncoding {
    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg { .. } => "image/jpeg",
        }
    }

    /// The lossy quality, absent for PNG.
    pub fn quality(&self) -> Option<f32> {
        match self {
            ImageEncoding::Png => None,
            ImageEncoding::Jpeg { quality } => Some(*quality),
        }
    }
}

/// Bounds applied when normalising a [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClampPolicy {
    pub min_scale: f32,
    pub max_scale: f32,
    pub min_quality: f32,
    pub max_quality: f32,
}

impl Default for ClampPolicy {
    fn default() -> Self {
        Self {
            min_scale: 1.0,
            max_scale: 3.0,
            min_quality: 0.4,
            max_quality: 1.0,
        }
    }
}

impl ClampPolicy {
    /// Clamp a scale; non-finite values become [`DEFAULT_RENDER_SCALE`].
    pub fn scale(&self, value: f32) -> f32 {
        let defaults = Self::default();
        let (lo, hi) = ordered(
            (self.min_scale, defaults.min_scale),
            (self.max_scale, defaults.max_scale),
        );
        if !value.is_finite() {
            return DEFAULT_RENDER_SCALE.clamp(lo, hi);
        }
        value.clamp(lo, hi)
    }

    /// Clamp a JPEG quality; non-finite values become [`DEFAULT_JPEG_QUALITY`].
    pub fn quality(&self, value: f32) -> f32 {
        let defaults = Self::default();
        let (lo, hi) = ordered(
            (self.min_quality, defaults.min_quality),
            (self.max_quality, defaults.max_quality),
        );
        if !value.is_finite() {
            return DEFAULT_JPEG_QUALITY.clamp(lo, hi);
        }
        value.clamp(lo, hi)
    }
}

/// Usable `(min, max)` bounds from a possibly malformed pair: non-finite
/// bounds take their fallback and inverted bounds are swapped.
fn ordered((min, min_fallback): (f32, f32), (max, max_fallback): (f32, f32)) -> (f32, f32) {
    let min = if min.is_finite() { min } else { min_fallback };
    let max = if max.is_finite() { max } else { max_fallback };
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

/// Per-request rendering configuration.
///
/// # Example
/// ```rust
/// use edgequake_pdf2pptx::{ImageEncoding, RenderConfig, RenderMode};
///
/// let cfg = RenderConfig::builder()
///     .scale(9.0)
///     .jpeg(0.1)
///     .mode(RenderMode::Hybrid)
///     .build();
/// assert_eq!(cfg.scale, 3.0);
/// assert_eq!(cfg.image_format, ImageEncoding::Jpeg { quality: 0.4 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Multiplier over the page's natural size for Strategy A. Range 1–3. Default 2.
    pub scale: f32,
    /// Encoding of page rasters. Default PNG.
    pub image_format: ImageEncoding,
    /// Rendering strategy. Default [`RenderMode::Image`].
    pub mode: RenderMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_RENDER_SCALE,
            image_format: ImageEncoding::Png,
            mode: RenderMode::Image,
        }
    }
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
            policy: ClampPolicy::default(),
        }
    }

    /// Re-apply `policy` to every numeric field.
    pub fn clamped(mut self, policy: &ClampPolicy) -> Self {
        self.scale = policy.scale(self.scale);
        if let ImageEncoding::Jpeg { quality } = self.image_format {
            self.image_format = ImageEncoding::Jpeg {
                quality: policy.quality(quality),
            };
        }
        self
    }
}

/// Builder for [`RenderConfig`]; every setter clamps silently.
#[derive(Debug, Clone)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
    policy: ClampPolicy,
}

impl RenderConfigBuilder {
    /// Use a non-default clamp policy for the following setters and `build`.
    pub fn policy(mut self, policy: ClampPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = self.policy.scale(scale);
        self
    }

    pub fn png(mut self) -> Self {
        self.config.image_format = ImageEncoding::Png;
        self
    }

    pub fn jpeg(mut self, quality: f32) -> Self {
        self.config.image_format = ImageEncoding::Jpeg {
            quality: self.policy.quality(quality),
        };
        self
    }

    pub fn image_format(mut self, format: ImageEncoding) -> Self {
        self.config.image_format = format;
        self
    }

    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn build(self) -> RenderConfig {
        self.config.clamped(&self.policy)
    }
}

/// Render settings as they arrive over the message boundary, before any
/// validation. Every field may be missing or of the wrong JSON type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRenderConfig {
    #[serde(default)]
    pub scale: Option<Value>,
    #[serde(default)]
    pub image_format: Option<Value>,
    #[serde(default)]
    pub jpeg_quality: Option<Value>,
    #[serde(default)]
    pub mode: Option<Value>,
}

impl RawRenderConfig {
    /// Normalise into a usable [`RenderConfig`].
    ///
    /// Numbers and numeric strings are accepted; anything else falls back to
    /// the defaults. The image format is JPEG only for the exact names
    /// `jpeg`/`jpg`; everything else means PNG.
    pub fn normalize(&self, policy: &ClampPolicy) -> RenderConfig {
        let scale = self
            .scale
            .as_ref()
            .and_then(number_from_value)
            .map(|v| v as f32)
            .unwrap_or(DEFAULT_RENDER_SCALE);

        let wants_jpeg = matches!(
            self.image_format.as_ref().and_then(Value::as_str),
            Some("jpeg") | Some("jpg")
        );
        let image_format = if wants_jpeg {
            let quality = self
                .jpeg_quality
                .as_ref()
                .and_then(number_from_value)
                .map(|v| v as f32)
                .unwrap_or(DEFAULT_JPEG_QUALITY);
            ImageEncoding::Jpeg { quality }
        } else {
            ImageEncoding::Png
        };

        let mode = self
            .mode
            .as_ref()
            .and_then(Value::as_str)
            .map(RenderMode::from_name)
            .unwrap_or_default();

        RenderConfig {
            scale,
            image_format,
            mode,
        }
        .clamped(policy)
    }
}

impl From<RenderConfig> for RawRenderConfig {
    fn from(cfg: RenderConfig) -> Self {
        Self {
            scale: Some(Value::from(cfg.scale as f64)),
            image_format: Some(Value::from(match cfg.image_format {
                ImageEncoding::Png => "png",
                ImageEncoding::Jpeg { .. } => "jpeg",
            })),
            jpeg_quality: cfg.image_format.quality().map(|q| Value::from(q as f64)),
            mode: Some(Value::from(cfg.mode.as_str())),
        }
    }
}

/// Read a finite number out of a JSON number or a numeric string.
fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

// ── Conversion config ────────────────────────────────────────────────────

/// Which execution context runs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePreference {
    /// Background worker when the decoder supports it, else inline. (default)
    #[default]
    Auto,
    /// Always run on the calling thread.
    Inline,
}

/// Configuration for a PDF-to-PPTX conversion.
///
/// Built via [`ConversionConfig::builder()`] or [`ConversionConfig::default()`].
#[derive(Clone)]
pub struct ConversionConfig {
    /// Per-request render settings (already clamped).
    pub render: RenderConfig,

    /// Policy used to clamp `render` and raw message payloads.
    pub clamp_policy: ClampPolicy,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Largest accepted input file in bytes. Default: 50 MiB.
    pub max_input_bytes: u64,

    /// Execution context selection. Default: [`EnginePreference::Auto`].
    pub engine: EnginePreference,

    /// Receives progress and log events while the pipeline runs.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-constructed PDF backend. Default: pdfium, located on first use.
    pub backend: Option<Arc<dyn PdfBackend>>,

    /// Token the caller can fire to abort the run at the next page boundary.
    pub cancel_token: Option<CancelToken>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            render: RenderConfig::default(),
            clamp_policy: ClampPolicy::default(),
            password: None,
            max_input_bytes: MAX_INPUT_BYTES,
            engine: EnginePreference::default(),
            progress_callback: None,
            backend: None,
            cancel_token: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("render", &self.render)
            .field("clamp_policy", &self.clamp_policy)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_input_bytes", &self.max_input_bytes)
            .field("engine", &self.engine)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("backend", &self.backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field("cancel_token", &self.cancel_token)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`]. Setters never fail; numeric values are clamped.
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn render(mut self, render: RenderConfig) -> Self {
        self.config.render = render.clamped(&self.config.clamp_policy);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.render.scale = self.config.clamp_policy.scale(scale);
        self
    }

    pub fn image_format(mut self, format: ImageEncoding) -> Self {
        self.config.render.image_format = format;
        self.config.render = self.config.render.clamped(&self.config.clamp_policy);
        self
    }

    pub fn mode(mut self, mode: RenderMode) -> Self {
        self.config.render.mode = mode;
        self
    }

    pub fn clamp_policy(mut self, policy: ClampPolicy) -> Self {
        self.config.clamp_policy = policy;
        self.config.render = self.config.render.clamped(&policy);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn max_input_bytes(mut self, limit: u64) -> Self {
        self.config.max_input_bytes = limit.max(1);
        self
    }

    pub fn engine(mut self, engine: EnginePreference) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel_token = Some(token);
        self
    }

    pub fn build(self) -> ConversionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scale_is_clamped() {
        let p = ClampPolicy::default();
        assert_eq!(p.scale(0.2), 1.0);
        assert_eq!(p.scale(2.5), 2.5);
        assert_eq!(p.scale(12.0), 3.0);
        assert_eq!(p.scale(f32::NAN), DEFAULT_RENDER_SCALE);
        assert_eq!(p.scale(f32::INFINITY), DEFAULT_RENDER_SCALE);
        assert_eq!(p.scale(-3.0), 1.0);
    }

    #[test]
    fn quality_is_clamped() {
        let p = ClampPolicy::default();
        assert_eq!(p.quality(0.0), 0.4);
        assert_eq!(p.quality(0.9), 0.9);
        assert_eq!(p.quality(7.0), 1.0);
        assert_eq!(p.quality(f32::NAN), DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn inverted_policy_is_swapped_not_fatal() {
        let policy = ClampPolicy {
            min_scale: 3.0,
            max_scale: 1.0,
            min_quality: 1.0,
            max_quality: 0.4,
        };
        assert_eq!(policy.scale(2.0), 2.0);
        assert_eq!(policy.scale(9.0), 3.0);
        assert_eq!(policy.scale(f32::NAN), DEFAULT_RENDER_SCALE);
        assert_eq!(policy.quality(0.1), 0.4);

        let cfg = RenderConfig::builder().policy(policy).scale(0.5).jpeg(5.0).build();
        assert_eq!(cfg.scale, 1.0);
        assert_eq!(cfg.image_format.quality(), Some(1.0));

        let config = ConversionConfig::builder().clamp_policy(policy).scale(7.0).build();
        assert_eq!(config.render.scale, 3.0);
    }

    #[test]
    fn non_finite_policy_bounds_fall_back() {
        let policy = ClampPolicy {
            min_scale: f32::NAN,
            max_scale: f32::INFINITY,
            ..ClampPolicy::default()
        };
        assert_eq!(policy.scale(0.1), 1.0);
        assert_eq!(policy.scale(10.0), 3.0);
    }

    #[test]
    fn raw_config_accepts_numbers_and_numeric_strings() {
        let raw: RawRenderConfig = serde_json::from_value(json!({
            "scale": "2.5",
            "image_format": "jpeg",
            "jpeg_quality": 0.1,
            "mode": "hybrid"
        }))
        .unwrap();
        let cfg = raw.normalize(&ClampPolicy::default());
        assert_eq!(cfg.scale, 2.5);
        assert_eq!(cfg.image_format, ImageEncoding::Jpeg { quality: 0.4 });
        assert_eq!(cfg.mode, RenderMode::Hybrid);
    }

    #[test]
    fn raw_config_garbage_falls_back_to_defaults() {
        let raw: RawRenderConfig = serde_json::from_value(json!({
            "scale": "huge",
            "image_format": "webp",
            "jpeg_quality": [1, 2],
            "mode": 42
        }))
        .unwrap();
        let cfg = raw.normalize(&ClampPolicy::default());
        assert_eq!(cfg, RenderConfig::default());
    }

    #[test]
    fn raw_config_missing_fields() {
        let cfg = RawRenderConfig::default().normalize(&ClampPolicy::default());
        assert_eq!(cfg.scale, DEFAULT_RENDER_SCALE);
        assert_eq!(cfg.image_format, ImageEncoding::Png);

        let raw: RawRenderConfig =
            serde_json::from_value(json!({ "image_format": "jpeg", "scale": null })).unwrap();
        let cfg = raw.normalize(&ClampPolicy::default());
        assert_eq!(
            cfg.image_format,
            ImageEncoding::Jpeg {
                quality: DEFAULT_JPEG_QUALITY
            }
        );
        assert_eq!(cfg.scale, DEFAULT_RENDER_SCALE);
    }

    #[test]
    fn out_of_range_numbers_are_clamped_not_rejected() {
        for (scale, expected) in [(-10.0, 1.0), (0.0, 1.0), (1.7, 1.7), (99.0, 3.0)] {
            let raw = RawRenderConfig {
                scale: Some(json!(scale)),
                ..Default::default()
            };
            assert_eq!(raw.normalize(&ClampPolicy::default()).scale, expected);
        }
    }

    #[test]
    fn custom_policy_is_honoured() {
        let policy = ClampPolicy {
            max_scale: 4.0,
            min_quality: 0.1,
            ..ClampPolicy::default()
        };
        let cfg = RenderConfig::builder()
            .policy(policy)
            .scale(3.5)
            .jpeg(0.2)
            .build();
        assert_eq!(cfg.scale, 3.5);
        assert_eq!(cfg.image_format.quality(), Some(0.2));
    }

    #[test]
    fn raw_round_trip_of_a_valid_config() {
        let cfg = RenderConfig::builder().scale(1.5).jpeg(0.75).build();
        let raw = RawRenderConfig::from(cfg);
        assert_eq!(raw.normalize(&ClampPolicy::default()), cfg);
    }

    #[test]
    fn builder_defaults() {
        let config = ConversionConfig::builder().build();
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.max_input_bytes, MAX_INPUT_BYTES);
        assert_eq!(config.engine, EnginePreference::Auto);
        assert!(config.backend.is_none());
    }

    #[test]
    fn builder_clamps_silently() {
        let config = ConversionConfig::builder()
            .scale(0.0)
            .image_format(ImageEncoding::Jpeg { quality: 3.0 })
            .max_input_bytes(0)
            .build();
        assert_eq!(config.render.scale, 1.0);
        assert_eq!(config.render.image_format.quality(), Some(1.0));
        assert_eq!(config.max_input_bytes, 1);
    }

    #[test]
    fn debug_redacts_password() {
        let config = ConversionConfig::builder().password("hunter2").build();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("redacted"));
    }
}
