//! Decoder invocation template

/// Placeholder replaced by the camera's source URL
pub const INPUT_URL: &str = "{input_url}";
/// Placeholder replaced by the JPEG quality scale
pub const QUALITY: &str = "{quality}";
/// Placeholder replaced by the output frame rate
pub const FPS: &str = "{fps}";

/// Default JPEG quality (ffmpeg `-q:v`, 2 = best, 31 = worst)
pub const DEFAULT_QUALITY: u32 = 8;

/// Default output frame rate
pub const DEFAULT_FPS: u32 = 12;

/// Low-latency RTSP to MJPEG transcode writing JPEGs to stdout
const DEFAULT_TEMPLATE: &str = "ffmpeg -rtsp_transport tcp -fflags nobuffer -flags low_delay \
    -strict experimental -flags2 +fast -fflags +discardcorrupt -analyzeduration 0 \
    -probesize 32 -i {input_url} -f mjpeg -q:v {quality} -r {fps} -update 1 -";

/// How to launch the decoder for one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Executable name or path
    pub program: String,
    /// Argument template, may contain placeholders
    pub args: Vec<String>,
    /// Value substituted for `{quality}`
    pub quality: u32,
    /// Value substituted for `{fps}`
    pub fps: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let mut words = DEFAULT_TEMPLATE.split_whitespace().map(str::to_string);

        Self {
            program: words.next().unwrap_or_default(),
            args: words.collect(),
            quality: DEFAULT_QUALITY,
            fps: DEFAULT_FPS,
        }
    }
}

impl DecoderConfig {
    /// Parse a whitespace-separated command line
    ///
    /// The template is split on whitespace only. Quotes, escapes and other
    /// shell syntax are passed through literally, so an argument containing
    /// spaces cannot be expressed. Build a `DecoderConfig` directly for such
    /// arguments. Returns `None` if the template has no program.
    pub fn from_template(template: &str) -> Option<Self> {
        let mut words = template.split_whitespace().map(str::to_string);
        let program = words.next()?;

        Some(Self {
            program,
            args: words.collect(),
            quality: DEFAULT_QUALITY,
            fps: DEFAULT_FPS,
        })
    }

    /// Set JPEG quality
    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Set output frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Substitute placeholders for one run
    pub fn render(&self, input_url: &str) -> Vec<String> {
        let quality = self.quality.to_string();
        let fps = self.fps.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_URL, input_url)
                    .replace(QUALITY, &quality)
                    .replace(FPS, &fps)
            })
            .collect()
    }

    /// Full command line for logging
    pub fn command_line(&self, input_url: &str) -> String {
        let mut line = self.program.clone();
        for arg in self.render(input_url) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}
