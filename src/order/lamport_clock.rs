use super::LogicalClock;
use std::fmt;

/// Scalar Lamport clock. Extending and merging both strictly increase it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LamportClock(u64);

impl LamportClock {
    pub const fn new(t: u64) -> Self {
        Self(t)
    }
}

impl LogicalClock for LamportClock {
    fn extend(&self) -> Self {
        Self(self.0 + 1)
    }
    fn merge(&self, other: &Self) -> Self {
        Self(self.0.max(other.0) + 1)
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::order::{lamport_clock::LamportClock, LogicalClock, OrdProcess};
    use proptest::prelude::*;
    use rand::Rng;

    #[derive(Default)]
    struct Process {
        clk: LamportClock,
        events: Vec<LamportClock>,
    }

    impl Process {
        fn exec<F: FnOnce()>(&mut self, f: F) {
            let e = self.clk.extend();
            self.set_clock(e);
            f();
        }
    }

    impl OrdProcess<LamportClock> for Process {
        fn clock(&self) -> LamportClock {
            self.clk
        }
        fn set_clock(&mut self, e: LamportClock) {
            self.clk = e;
            self.events.push(e);
        }
    }

    #[test]
    fn extend_and_merge() {
        let e1 = LamportClock::default();
        assert_eq!(e1.extend(), LamportClock::new(1));
        assert_eq!(LamportClock::new(3).merge(&LamportClock::new(7)), LamportClock::new(8));
        assert_eq!(LamportClock::new(7).merge(&LamportClock::new(3)), LamportClock::new(8));
        assert_eq!(LamportClock::new(4).merge(&LamportClock::new(4)), LamportClock::new(5));
    }

    #[test]
    fn mock_scheduler() {
        let (tx3_2, rx3_2) = std::sync::mpsc::channel::<LamportClock>();
        let (tx1_2, rx1_2) = std::sync::mpsc::channel::<LamportClock>();
        let (tx3, rx3) = std::sync::mpsc::channel::<LamportClock>();

        let th1 = std::thread::spawn(move || {
            let mut p = Process::default();
            p.exec(rand_timeout);
            p.send(|e| tx1_2.send(e).unwrap());
            p.exec(rand_timeout);
            p.events
        });
        let th2 = std::thread::spawn(move || {
            let mut p = Process::default();
            p.exec(rand_timeout);
            p.recv(&rx3_2.recv().unwrap());
            p.recv(&rx1_2.recv().unwrap());
            p.send(|e| tx3.send(e).unwrap());
            p.events
        });
        let th3 = std::thread::spawn(move || {
            let mut p = Process::default();
            p.exec(rand_timeout);
            p.send(|e| tx3_2.send(e).unwrap());
            p.exec(rand_timeout);
            p.recv(&rx3.recv().unwrap());
            p.events
        });

        let p1 = th1.join().unwrap();
        let p2 = th2.join().unwrap();
        let p3 = th3.join().unwrap();

        // Number of events
        assert_eq!(p1.len(), 3);
        assert_eq!(p2.len(), 4);
        assert_eq!(p3.len(), 4);

        // Program order --> s<t
        assert!(p1.iter().zip(&p1[1..]).all(|(s, t)| s < t));
        assert!(p2.iter().zip(&p2[1..]).all(|(s, t)| s < t));
        assert!(p3.iter().zip(&p3[1..]).all(|(s, t)| s < t));

        // Send-receive | transitive order --> s<t
        assert!(p3[..2].iter().all(|s| s < &p2[1])); // from p3 to p2
        assert!(p1[..2].iter().all(|s| s < &p2[2])); // from p1 to p2
        assert!(p3[..2].iter().all(|s| s < &p2[2]));
        assert!(p2.iter().all(|s| s < &p3[3])); // from p2 to p3
        assert!(p1[..2].iter().all(|s| s < &p3[3]));
    }

    proptest! {
        #[test]
        fn strictly_increases(start in 0u64..1_000_000, received in proptest::collection::vec(0u64..2_000_000, 1..64)) {
            let mut p = Process { clk: LamportClock::new(start), events: Vec::new() };
            for (n, r) in received.into_iter().enumerate() {
                let before = p.clock();
                if n % 2 == 0 {
                    p.send(|_| ());
                } else {
                    p.recv(&LamportClock::new(r));
                    prop_assert!(p.clock() > LamportClock::new(r));
                }
                prop_assert!(p.clock() > before);
            }
        }
    }

    fn rand_timeout() {
        let mut rng = rand::thread_rng();
        let t = rng.gen_range(0..=50);
        std::thread::sleep(std::time::Duration::from_millis(t));
    }
}
