use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Adaptive inter-request spacing for a single target host.
///
/// Each fetch reserves the next available time slot and sleeps until it;
/// after the response arrives, [`Throttle::record`] moves the delay halfway
/// toward `latency / target_concurrency`. The delay never shrinks after an
/// error response and always stays within `[floor, ceiling]`.
pub struct Throttle {
    floor: Duration,
    ceiling: Duration,
    target_concurrency: f64,
    state: Mutex<State>,
}

struct State {
    delay: Duration,
    next_slot: Option<Instant>,
}

impl Throttle {
    pub fn new(
        start: Duration,
        floor: Duration,
        ceiling: Duration,
        target_concurrency: f64,
    ) -> Self {
        let delay = start.clamp(floor, ceiling.max(floor));
        Self {
            floor,
            ceiling: ceiling.max(floor),
            target_concurrency,
            state: Mutex::new(State {
                delay,
                next_slot: None,
            }),
        }
    }

    /// Wait for the next request slot. Concurrent callers are serialized:
    /// each reservation pushes the following slot out by the current delay.
    pub async fn acquire(&self) {
        let slot = {
            let mut s = self.state.lock().await;
            let now = Instant::now();
            let at = match s.next_slot {
                Some(t) if t > now => t,
                _ => now,
            };
            s.next_slot = Some(at + s.delay);
            at
        };
        sleep_until(slot).await;
    }

    /// Feed back the observed latency and outcome of a completed request.
    pub async fn record(&self, latency: Duration, ok: bool) {
        let mut s = self.state.lock().await;
        s.delay = next_delay(
            s.delay,
            latency,
            ok,
            self.target_concurrency,
            self.floor,
            self.ceiling,
        );
    }

    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.delay
    }
}

fn next_delay(
    current: Duration,
    latency: Duration,
    ok: bool,
    target_concurrency: f64,
    floor: Duration,
    ceiling: Duration,
) -> Duration {
    let target = latency.div_f64(target_concurrency.max(0.1));
    let mut next = (current + target) / 2;
    if !ok && next < current {
        next = current;
    }
    next.clamp(floor, ceiling)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: Duration = Duration::from_millis(100);
    const CEILING: Duration = Duration::from_secs(60);

    fn step(current_ms: u64, latency_ms: u64, ok: bool) -> Duration {
        next_delay(
            Duration::from_millis(current_ms),
            Duration::from_millis(latency_ms),
            ok,
            1.0,
            FLOOR,
            CEILING,
        )
    }

    #[test]
    fn fast_responses_shrink_toward_floor() {
        let mut delay = Duration::from_secs(5);
        for _ in 0..20 {
            delay = next_delay(delay, Duration::from_millis(50), true, 1.0, FLOOR, CEILING);
        }
        assert_eq!(delay, FLOOR);
    }

    #[test]
    fn slow_responses_grow_delay() {
        assert_eq!(step(1000, 4000, true), Duration::from_millis(2500));
    }

    #[test]
    fn errors_never_shrink_delay() {
        assert_eq!(step(2000, 100, false), Duration::from_millis(2000));
        // but an error after a slow response still grows it
        assert_eq!(step(1000, 5000, false), Duration::from_millis(3000));
    }

    #[test]
    fn delay_is_clamped() {
        assert_eq!(step(100, 1, true), FLOOR);
        let huge = next_delay(
            Duration::from_secs(59),
            Duration::from_secs(600),
            true,
            1.0,
            FLOOR,
            CEILING,
        );
        assert_eq!(huge, CEILING);
    }

    #[test]
    fn target_concurrency_divides_latency() {
        let d = next_delay(
            Duration::from_secs(2),
            Duration::from_secs(4),
            true,
            2.0,
            FLOOR,
            CEILING,
        );
        // target = 4s / 2 = 2s, midpoint of (2s, 2s)
        assert_eq!(d, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_spaces_requests_by_current_delay() {
        let throttle = Throttle::new(FLOOR, FLOOR, CEILING, 1.0);
        let t0 = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(t0.elapsed() >= Duration::from_millis(200));
    }
}
