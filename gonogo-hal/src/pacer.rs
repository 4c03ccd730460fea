use std::time::{Duration, Instant};

/// Paces the control loop at a fixed tick period. The deadline advances
/// by exactly one period per tick, so a late tick is absorbed instead
/// of compounding.
#[derive(Debug, Clone)]
pub struct TickPacer {
    period: Duration,
    next: Instant,
}

impl TickPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleeps until the next tick deadline.
    pub fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            precise_sleep(self.next - now);
        } else {
            log::debug!("tick overran by {:?}", now - self.next);
        }
        self.next += self.period;
    }
}

#[cfg(target_os = "linux")]
fn precise_sleep(duration: Duration) {
    use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

    let req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };

    unsafe {
        clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
    }
}

#[cfg(not(target_os = "linux"))]
fn precise_sleep(duration: Duration) {
    std::thread::sleep(duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_advances_the_deadline_by_one_period() {
        let mut pacer = TickPacer::new(Duration::from_millis(1));
        let start = Instant::now();
        for _ in 0..5 {
            pacer.wait();
        }
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
