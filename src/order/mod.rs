pub mod lamport_clock;

pub use lamport_clock::LamportClock;

// Ord because a scalar clock totally orders its own events; ties across processes are broken by the caller
pub trait LogicalClock: Ord + Copy + Default {
    fn extend(&self) -> Self;
    fn merge(&self, other: &Self) -> Self;
}

pub trait OrdProcess<Event>
where
    Event: LogicalClock,
{
    fn clock(&self) -> Event;
    fn set_clock(&mut self, e: Event);

    // Provide a fresh clock to the sending party before anything leaves the process
    fn send<T, F: FnOnce(Event) -> T>(&mut self, send_fn: F) -> T {
        let e = self.clock().extend();
        self.set_clock(e);
        send_fn(e)
    }
    // Receives clock from sending party and updates own clock
    fn recv(&mut self, e_recv: &Event) -> Event {
        let e = self.clock().merge(e_recv);
        self.set_clock(e);
        e
    }
}
