//! Pipeline configuration with sane defaults.

/// Tunables shared by the pipeline actions.
#[derive(Debug, Clone)]
pub struct Config {
  /// Max stack frames to include in fingerprint.
  pub fingerprint_max_frames: usize,
  /// Upper bound on the number of tags kept on a stack.
  pub max_tags_per_stack: usize,
  /// Stack titles longer than this are truncated (in chars).
  pub stack_title_max_len: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      fingerprint_max_frames: 5,
      max_tags_per_stack: 50,
      stack_title_max_len: 1000,
    }
  }
}
