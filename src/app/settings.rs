use std::path::PathBuf;

use crate::errors::{AnimaError, Result};

/// Configuration of the headless avatar player.
///
/// ```rust,ignore
/// use anima::app::PlayerSettings;
///
/// let settings = PlayerSettings {
///     run_seconds: 10.0,
///     pause_at: Some(2.5),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    /// `.vrm` model to load.
    pub model_path: PathBuf,
    /// `.vrma` animation to play on the model.
    pub animation_path: PathBuf,

    /// Simulation step in seconds.
    pub fixed_timestep: f32,
    /// How long the frame loop runs, in seconds of simulated time.
    pub run_seconds: f32,

    // === Playback controls ===
    /// Presses "Pause" once the clock reaches this time.
    pub pause_at: Option<f32>,
    /// Moves the "Time" slider to this clip time after loading.
    pub scrub_to: Option<f32>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("assets/models/avatar.vrm"),
            animation_path: PathBuf::from("assets/animations/motion.vrma"),
            fixed_timestep: 1.0 / 60.0,
            run_seconds: 5.0,
            pause_at: None,
            scrub_to: None,
        }
    }
}

impl PlayerSettings {
    pub const USAGE: &'static str = "Usage: vrma_player [model.vrm] [animation.vrma] [--seconds N] [--pause-at T] [--scrub T]";

    /// Parses command-line arguments (without the program name) over the defaults.
    ///
    /// Positional arguments fill the model and then the animation path.
    pub fn from_args<I>(args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut settings = Self::default();
        let mut args = args.into_iter().map(Into::into);
        let mut positional = 0usize;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--seconds" => {
                    settings.run_seconds = parse_seconds(&arg, args.next())?;
                }
                "--pause-at" => {
                    settings.pause_at = Some(parse_seconds(&arg, args.next())?);
                }
                "--scrub" => {
                    settings.scrub_to = Some(parse_seconds(&arg, args.next())?);
                }
                flag if flag.starts_with("--") => {
                    return Err(AnimaError::InvalidArgument(format!(
                        "Unknown argument '{flag}'. {}",
                        Self::USAGE
                    )));
                }
                _ => {
                    match positional {
                        0 => settings.model_path = PathBuf::from(arg),
                        1 => settings.animation_path = PathBuf::from(arg),
                        _ => {
                            return Err(AnimaError::InvalidArgument(format!(
                                "Unexpected argument '{arg}'. {}",
                                Self::USAGE
                            )));
                        }
                    }
                    positional += 1;
                }
            }
        }

        Ok(settings)
    }
}

fn parse_seconds(flag: &str, value: Option<String>) -> Result<f32> {
    let value = value.ok_or_else(|| AnimaError::InvalidArgument(format!("{flag} requires a value")))?;
    let seconds: f32 = value
        .parse()
        .map_err(|_| AnimaError::InvalidArgument(format!("{flag}: '{value}' is not a number")))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(AnimaError::InvalidArgument(format!(
            "{flag}: expected a non-negative number, got {seconds}"
        )));
    }
    Ok(seconds)
}
