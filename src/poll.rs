use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

use crate::device::{Transport, TransportError};
use crate::logger::Logger;
use crate::report::{
    decode, hexdump, select_mode, BatteryEncoding, BatteryReading, DecodeError, TransportMode,
};
use crate::scheduler::{Scheduler, TimerToken};
use crate::{BATTERY_FEATURE_REPORT_ID, INPUT_REPORT_REQUEST, REPORT_LEN};

#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Battery feature report exchange failed: {0}")]
    FeatureReportFailure(TransportError),
}

/// Result of one poll cycle.
#[derive(Debug)]
pub struct PollOutcome {
    pub mode: TransportMode,
    pub result: Result<BatteryReading, PollError>,
}

#[derive(Clone, Debug)]
pub struct PollSettings {
    pub encoding: BatteryEncoding,
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    pub read_timeout_ms: i32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            encoding: BatteryEncoding::default(),
            initial_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(10),
            read_timeout_ms: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollState {
    Idle,
    Scheduled(TimerToken),
}

/// Self-rescheduling battery poll bound to one open device.
pub struct Poller {
    settings: PollSettings,
    logger: Rc<dyn Logger>,
    state: PollState,
}

impl Poller {
    pub fn new(settings: PollSettings, logger: Rc<dyn Logger>) -> Self {
        Self {
            settings,
            logger,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Arms the first poll after the settle delay. Does nothing if a poll is
    /// already pending.
    pub fn start(&mut self, scheduler: &mut dyn Scheduler) {
        if self.state == PollState::Idle {
            let token = scheduler.after(self.settings.initial_delay);
            tracing::debug!("First battery poll in {:?}", self.settings.initial_delay);
            self.state = PollState::Scheduled(token);
        }
    }

    pub fn stop(&mut self, scheduler: &mut dyn Scheduler) {
        if let PollState::Scheduled(token) = self.state {
            scheduler.cancel(token);
            tracing::debug!("Battery polling stopped");
        }
        self.state = PollState::Idle;
    }

    /// Runs one cycle if `token` is the pending timer, then re-arms.
    ///
    /// Timers that were cancelled or already consumed return `None` without
    /// touching the device.
    pub fn on_timer<T: Transport + ?Sized>(
        &mut self,
        token: TimerToken,
        device: &mut T,
        scheduler: &mut dyn Scheduler,
    ) -> Option<PollOutcome> {
        if self.state != PollState::Scheduled(token) {
            tracing::trace!("Ignoring stale timer {:?}", token);
            return None;
        }

        let outcome = self.poll_once(device);
        self.report(&outcome);

        self.state = PollState::Scheduled(scheduler.after(self.settings.poll_interval));
        Some(outcome)
    }

    fn poll_once<T: Transport + ?Sized>(&self, device: &mut T) -> PollOutcome {
        if let Err(e) = device.write_report(&INPUT_REPORT_REQUEST) {
            tracing::debug!("Input report request failed: {}", e);
        }

        let mut buf = [0u8; REPORT_LEN];
        let len = match device.read(&mut buf, self.settings.read_timeout_ms) {
            Ok(len) => len.min(REPORT_LEN),
            Err(e) => {
                tracing::debug!("Error reading input report: {}", e);
                0
            }
        };
        tracing::debug!("Input report ({} bytes):\n{}", len, hexdump(&buf[..len], 16));

        let mode = select_mode(len);
        let result = match mode {
            TransportMode::Wired => {
                decode(&buf[..len], mode, self.settings.encoding).map_err(PollError::from)
            }
            TransportMode::Wireless => self.request_feature_report(device),
        };

        PollOutcome { mode, result }
    }

    fn request_feature_report<T: Transport + ?Sized>(
        &self,
        device: &mut T,
    ) -> Result<BatteryReading, PollError> {
        device
            .send_feature_report(&[BATTERY_FEATURE_REPORT_ID])
            .map_err(PollError::FeatureReportFailure)?;

        let mut buf = [0u8; REPORT_LEN];
        buf[0] = BATTERY_FEATURE_REPORT_ID;
        let len = device
            .get_feature_report(&mut buf)
            .map_err(PollError::FeatureReportFailure)?
            .min(REPORT_LEN);
        tracing::debug!("Feature report ({} bytes):\n{}", len, hexdump(&buf[..len], 16));

        Ok(decode(&buf[..len], TransportMode::Wireless, self.settings.encoding)?)
    }

    fn report(&self, outcome: &PollOutcome) {
        match &outcome.result {
            Ok(reading) => {
                self.logger.log(reading.message);
                self.logger.log(&format!("Battery Level: {}%", reading.percentage));
                self.logger.log(&format!("Charging status: {}", reading.charging));
            }
            Err(PollError::Decode(e)) => {
                tracing::debug!("{}", e);
                self.logger.log("No battery data received.");
            }
            Err(e) => {
                tracing::warn!("{} poll failed: {}", outcome.mode, e);
                self.logger.log(&format!("Failed to read battery status: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::report::ChargingStatus;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<String>>);

    impl Logger for Recorder {
        fn log(&self, text: &str) {
            self.0.borrow_mut().push(text.to_string());
        }
    }

    #[derive(Default)]
    struct Timers {
        next: u64,
        armed: Vec<(TimerToken, Duration)>,
        cancelled: Vec<TimerToken>,
    }

    impl Scheduler for Timers {
        fn after(&mut self, delay: Duration) -> TimerToken {
            self.next += 1;
            let token = TimerToken(self.next);
            self.armed.push((token, delay));
            token
        }

        fn cancel(&mut self, token: TimerToken) {
            self.cancelled.push(token);
        }
    }

    #[derive(Default)]
    struct FakeController {
        input: VecDeque<Vec<u8>>,
        feature: Option<Vec<u8>>,
        writes: usize,
        feature_requests: usize,
    }

    impl Transport for FakeController {
        fn write_report(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
            self.writes += 1;
            Ok(buf.len())
        }

        fn read(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize, TransportError> {
            match self.input.pop_front() {
                Some(report) => {
                    buf[..report.len()].copy_from_slice(&report);
                    Ok(report.len())
                }
                None => Ok(0),
            }
        }

        fn send_feature_report(&mut self, _buf: &[u8]) -> Result<(), TransportError> {
            self.feature_requests += 1;
            match self.feature {
                Some(_) => Ok(()),
                None => Err(TransportError::Io("no feature report".to_string())),
            }
        }

        fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let report = self.feature.as_ref().ok_or(TransportError::Io("gone".into()))?;
            buf[..report.len()].copy_from_slice(report);
            Ok(report.len())
        }
    }

    fn wired(status: u8) -> Vec<u8> {
        let mut report = vec![0u8; 64];
        report[12] = status;
        report
    }

    fn started(encoding: BatteryEncoding) -> (Poller, Rc<Recorder>, Timers, TimerToken) {
        let recorder = Rc::new(Recorder::default());
        let settings = PollSettings {
            encoding,
            ..PollSettings::default()
        };
        let mut poller = Poller::new(settings, recorder.clone());
        let mut timers = Timers::default();
        poller.start(&mut timers);
        let token = match poller.state() {
            PollState::Scheduled(token) => token,
            PollState::Idle => panic!("poller did not start"),
        };
        (poller, recorder, timers, token)
    }

    #[test]
    fn start_uses_settle_delay() {
        let (poller, _, timers, token) = started(BatteryEncoding::EightLevel);
        assert_eq!(timers.armed, vec![(token, Duration::from_secs(1))]);
        assert_eq!(poller.state(), PollState::Scheduled(token));
    }

    #[test]
    fn wired_cycle_logs_and_reschedules() {
        let (mut poller, recorder, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut controller = FakeController {
            input: VecDeque::from([wired(0x07)]),
            ..Default::default()
        };

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert_eq!(outcome.mode, TransportMode::Wired);
        let reading = outcome.result.unwrap();
        assert_eq!(reading.percentage, 87);
        assert_eq!(reading.charging, ChargingStatus::NotCharging);

        assert_eq!(controller.writes, 1);
        assert_eq!(controller.feature_requests, 0);
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                "Battery is full!".to_string(),
                "Battery Level: 87%".to_string(),
                "Charging status: not charging".to_string(),
            ]
        );
        assert_eq!(timers.armed.len(), 2);
        assert_eq!(timers.armed[1].1, Duration::from_secs(10));
        assert_eq!(poller.state(), PollState::Scheduled(timers.armed[1].0));
    }

    #[test]
    fn short_read_goes_through_feature_report() {
        let (mut poller, recorder, mut timers, token) = started(BatteryEncoding::ElevenLevel);
        let mut controller = FakeController {
            input: VecDeque::from([vec![0x01; 5]]),
            feature: Some(vec![0x05, 0x0A, 0x00]),
            ..Default::default()
        };

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert_eq!(outcome.mode, TransportMode::Wireless);
        assert_eq!(controller.feature_requests, 1);

        let reading = outcome.result.unwrap();
        assert_eq!(reading.raw_level, 10);
        assert_eq!(reading.percentage, 90);
        assert_eq!(reading.charging, ChargingStatus::Unknown);
        assert_eq!(recorder.0.borrow()[2], "Charging status: unknown");
    }

    #[test]
    fn thirteen_byte_read_is_wired() {
        let (mut poller, _, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut report = vec![0u8; 13];
        report[12] = 0x16;
        let mut controller = FakeController {
            input: VecDeque::from([report]),
            feature: Some(vec![0x05, 0x01]),
            ..Default::default()
        };

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert_eq!(outcome.mode, TransportMode::Wired);
        assert_eq!(controller.feature_requests, 0);

        let reading = outcome.result.unwrap();
        assert_eq!(reading.raw_level, 6);
        assert_eq!(reading.charging, ChargingStatus::Charging);
    }

    #[test]
    fn twelve_byte_read_is_wireless() {
        let (mut poller, _, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut controller = FakeController {
            input: VecDeque::from([vec![0x07; 12]]),
            feature: Some(vec![0x05, 0x02]),
            ..Default::default()
        };

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert_eq!(outcome.mode, TransportMode::Wireless);
        assert_eq!(controller.feature_requests, 1);

        let reading = outcome.result.unwrap();
        assert_eq!(reading.raw_level, 2);
        assert_eq!(reading.percentage, 25);
        assert_eq!(reading.charging, ChargingStatus::Unknown);
    }

    #[test]
    fn failed_feature_report_still_reschedules() {
        let (mut poller, recorder, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut controller = FakeController::default();

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert!(matches!(
            outcome.result,
            Err(PollError::FeatureReportFailure(_))
        ));
        assert_eq!(recorder.0.borrow().len(), 1);
        assert!(recorder.0.borrow()[0].starts_with("Failed to read battery status"));
        assert!(matches!(poller.state(), PollState::Scheduled(t) if t != token));
    }

    #[test]
    fn empty_feature_report_is_no_data() {
        let (mut poller, recorder, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut controller = FakeController {
            feature: Some(vec![0x05]),
            ..Default::default()
        };

        let outcome = poller.on_timer(token, &mut controller, &mut timers).unwrap();
        assert!(matches!(
            outcome.result,
            Err(PollError::Decode(DecodeError::InsufficientData { .. }))
        ));
        assert_eq!(*recorder.0.borrow(), vec!["No battery data received.".to_string()]);
        assert_eq!(timers.armed.len(), 2);
    }

    #[test]
    fn stale_and_cancelled_timers_are_ignored() {
        let (mut poller, recorder, mut timers, token) = started(BatteryEncoding::EightLevel);
        let mut controller = FakeController {
            input: VecDeque::from([wired(0x05)]),
            ..Default::default()
        };

        assert!(poller
            .on_timer(TimerToken(42), &mut controller, &mut timers)
            .is_none());

        poller.stop(&mut timers);
        assert_eq!(timers.cancelled, vec![token]);
        assert_eq!(poller.state(), PollState::Idle);
        assert!(poller.on_timer(token, &mut controller, &mut timers).is_none());

        assert_eq!(controller.writes, 0);
        assert!(recorder.0.borrow().is_empty());
        assert_eq!(timers.armed.len(), 1);
    }
}
