//! Where run progress goes: startup parameters, heartbeats, final tally.

use crate::config::TestConfig;
use crate::target::Target;

pub trait Reporter {
    fn started(&mut self, config: &TestConfig, target: &Target);
    fn heartbeat(&mut self, active: usize, elapsed: u64);
    fn finished(&mut self, summary: &Summary);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn started(&mut self, config: &TestConfig, target: &Target) {
        (**self).started(config, target)
    }

    fn heartbeat(&mut self, active: usize, elapsed: u64) {
        (**self).heartbeat(active, elapsed)
    }

    fn finished(&mut self, summary: &Summary) {
        (**self).finished(summary)
    }
}

/// State of the pool when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Connections still open at exit.
    pub active: usize,
    pub elapsed: u64,
    /// Connections ever opened.
    pub admitted: usize,
    /// Connection target after any capacity shrinkage.
    pub target: usize,
}

#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn started(&mut self, config: &TestConfig, target: &Target) {
        tracing::info!(
            "Using:\n\
             test mode:                        {mode}\n\
             URL:                              {target}\n\
             number of connections:            {connections}\n\
             interval between follow up data:  {interval} seconds\n\
             connections per seconds:          {rate}\n\
             test duration:                    {duration} seconds",
            mode = config.mode,
            connections = config.connections,
            interval = config.interval,
            rate = config.rate,
            duration = config.duration,
        );
    }

    fn heartbeat(&mut self, active: usize, elapsed: u64) {
        tracing::info!("Slow HTTP test status: {active} open connection(s) on {elapsed}th second");
    }

    fn finished(&mut self, summary: &Summary) {
        tracing::info!(
            admitted = summary.admitted,
            capped_at = summary.target,
            "{active} active sockets left by the end of the test on {elapsed}th second",
            active = summary.active,
            elapsed = summary.elapsed,
        );
    }
}
