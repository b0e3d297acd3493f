//! Clock and pacing for live code streaming.
//!
//! Typing delays depend on the class of the character just written. The
//! pacer is swappable: production uses [`JitteredPacer`], tests use
//! [`InstantPacer`].

use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Character classes with distinct typing delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Newline,
    Bracket,
    Operator,
    Punctuation,
    Space,
    Ordinary,
}

impl CharClass {
    pub fn of(c: char) -> Self {
        match c {
            '\n' | '\r' => Self::Newline,
            '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' => Self::Bracket,
            '=' | '+' | '-' | '*' | '/' | '%' | '&' | '|' | '!' | '^' | '~' => Self::Operator,
            '.' | ',' | ';' | ':' | '?' | '"' | '\'' | '`' => Self::Punctuation,
            c if c.is_whitespace() => Self::Space,
            _ => Self::Ordinary,
        }
    }

    /// Inclusive delay range in milliseconds at typing speed 1.0.
    pub fn delay_range_ms(&self) -> (u64, u64) {
        match self {
            Self::Newline => (400, 600),
            Self::Bracket => (250, 350),
            Self::Operator => (200, 280),
            Self::Punctuation => (200, 300),
            Self::Space => (80, 120),
            Self::Ordinary => (150, 250),
        }
    }
}

/// Decides how long to wait after writing a character.
pub trait Pacer: Send + Sync {
    fn delay_for(&self, c: char) -> Duration;
}

/// Human-like pacing with jitter. `typing_speed` divides every delay.
#[derive(Debug, Clone)]
pub struct JitteredPacer {
    typing_speed: f64,
}

impl JitteredPacer {
    pub fn new(typing_speed: f64) -> Self {
        let typing_speed = if typing_speed.is_finite() && typing_speed > 0.0 {
            typing_speed
        } else {
            1.0
        };
        Self { typing_speed }
    }

    pub fn typing_speed(&self) -> f64 {
        self.typing_speed
    }
}

impl Default for JitteredPacer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Pacer for JitteredPacer {
    fn delay_for(&self, c: char) -> Duration {
        let (lo, hi) = CharClass::of(c).delay_range_ms();
        let ms = rand::rng().random_range(lo..=hi);
        Duration::from_micros((ms as f64 * 1000.0 / self.typing_speed).round() as u64)
    }
}

/// Zero-delay pacing.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPacer;

impl Pacer for InstantPacer {
    fn delay_for(&self, _c: char) -> Duration {
        Duration::ZERO
    }
}

/// Sleep for `duration` unless the token fires first.
///
/// A zero duration still yields to the scheduler and observes the token, so
/// every pacing point is a cancellation point.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> CoreResult<()> {
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    if duration.is_zero() {
        tokio::task::yield_now().await;
        return if cancel.is_cancelled() {
            Err(CoreError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(CoreError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Monotonic session clock with wall-clock timestamps for events.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    started: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds since the clock started (monotonic).
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Wall-clock milliseconds since the Unix epoch.
    pub fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_classes() {
        assert_eq!(CharClass::of('\n'), CharClass::Newline);
        assert_eq!(CharClass::of('{'), CharClass::Bracket);
        assert_eq!(CharClass::of('='), CharClass::Operator);
        assert_eq!(CharClass::of(';'), CharClass::Punctuation);
        assert_eq!(CharClass::of(' '), CharClass::Space);
        assert_eq!(CharClass::of('a'), CharClass::Ordinary);
    }

    #[test]
    fn test_jittered_delay_within_range() {
        let pacer = JitteredPacer::new(1.0);
        for _ in 0..50 {
            let ms = pacer.delay_for('\n').as_millis();
            assert!((400..=600).contains(&ms), "newline delay {} out of range", ms);
        }
    }

    #[test]
    fn test_typing_speed_divides_delay() {
        let pacer = JitteredPacer::new(4.0);
        for _ in 0..50 {
            let ms = pacer.delay_for(' ').as_millis();
            assert!((20..=30).contains(&ms), "space delay {} out of range", ms);
        }
    }

    #[test]
    fn test_invalid_speed_falls_back_to_one() {
        assert_eq!(JitteredPacer::new(0.0).typing_speed(), 1.0);
        assert_eq!(JitteredPacer::new(f64::NAN).typing_speed(), 1.0);
    }

    #[tokio::test]
    async fn test_pause_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            pause(Duration::from_secs(10), &token).await,
            Err(CoreError::Cancelled)
        ));
        assert!(pause(Duration::ZERO, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_pause_completes() {
        let token = CancellationToken::new();
        assert!(pause(Duration::from_millis(1), &token).await.is_ok());
    }
}
