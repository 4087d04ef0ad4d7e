//! CPU utilization colors.

use std::thread;

use sysinfo::System;

use crate::color;
use crate::frame::{LedEntry, LED_COUNT};

/// Source of per-CPU utilization.
pub trait CpuLoad {
    /// Utilization of every logical CPU in percent.
    fn per_cpu_utilization(&mut self) -> Vec<f32>;
}

/// CPU utilization read through `sysinfo`.
pub struct SysinfoCpuLoad {
    system: System,
}

impl SysinfoCpuLoad {
    pub fn new() -> Self {
        Self { system: System::new() }
    }
}

impl CpuLoad for SysinfoCpuLoad {
    fn per_cpu_utilization(&mut self) -> Vec<f32> {
        // Usage is computed from the difference between two refreshes.
        self.system.refresh_cpu_usage();
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        self.system.refresh_cpu_usage();

        self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect()
    }
}

/// Color one LED per CPU, green when idle and red when busy.
///
/// CPUs beyond the lightbar's LED count are ignored.
pub fn cpu_frame(loads: &[f32]) -> Vec<LedEntry> {
    loads
        .iter()
        .zip(0..LED_COUNT)
        .map(|(&load, index)| LedEntry::new(index, color::green_to_red_percentage(f64::from(load))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLoad(Vec<f32>);

    impl CpuLoad for FixedLoad {
        fn per_cpu_utilization(&mut self) -> Vec<f32> {
            self.0.clone()
        }
    }

    #[test]
    fn one_led_per_cpu() {
        let mut source = FixedLoad(vec![0., 50., 100.]);

        let entries = cpu_frame(&source.per_cpu_utilization());

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], LedEntry::new(0, color::green_to_red_percentage(0.)));
        assert_eq!(entries[2], LedEntry::new(2, color::green_to_red_percentage(100.)));
        assert!(entries.iter().all(|entry| entry.enabled));
    }

    #[test]
    fn extra_cpus_are_dropped() {
        let entries = cpu_frame(&[10.; 64]);

        assert_eq!(entries.len(), LED_COUNT as usize);
        assert_eq!(entries.last().map(|entry| entry.index), Some(LED_COUNT - 1));
    }
}
