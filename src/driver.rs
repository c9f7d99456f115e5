//! # Command Protocol Driver
//!
//! Synchronous request/response driver for a VESC motor controller.
//!
//! Each call is a single attempt: build the payload, frame and write it,
//! then (for requests) poll the transport until a valid frame arrives or the
//! timeout elapses. Decoded replies overwrite the matching snapshot held by
//! the driver; a failed call leaves the previous snapshot in place.
//!
//! ## Usage
//!
//! ```no_run
//! use vesc_uart::driver::{Target, VescUart};
//! use vesc_uart::transport::SerialTransport;
//!
//! let mut vesc = VescUart::new(SerialTransport::open()?);
//!
//! vesc.get_values(Target::Local)?;
//! println!("{} V", vesc.telemetry().input_voltage);
//!
//! vesc.set_current(4.0, Target::Can(2))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, VescError};
use crate::protocol::buffer::{PayloadReader, PayloadWriter, ShortRead};
use crate::protocol::commands::CommandId;
use crate::protocol::fields::{decode_fields, encode_fields, Layout};
use crate::protocol::frame::{encode_frame, FrameDecoder};
use crate::protocol::values::*;
use crate::transport::Transport;

/// Default reply timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause between transport polls while waiting for a reply
const POLL_BACKOFF: Duration = Duration::from_micros(500);

/// Zeroed accelerometer block trailing a nunchuk update (3 × i16)
const CHUCK_ACCEL_PADDING: [u8; 6] = [0; 6];

/// Which controller a command is addressed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Target {
    /// Controller attached to this UART
    #[default]
    Local,
    /// Controller with this id on the CAN bus, forwarded by the local one
    Can(u8),
}

impl From<Option<u8>> for Target {
    fn from(can_id: Option<u8>) -> Self {
        can_id.map_or(Target::Local, Target::Can)
    }
}

/// What a reply shorter than its layout does to the stored snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Fields decoded before the truncation point are kept
    #[default]
    Partial,
    /// Snapshot is only replaced when every field decoded
    AllOrNothing,
}

/// Driver settings fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Bound on every blocking receive
    pub timeout: Duration,
    pub commit: CommitPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            commit: CommitPolicy::Partial,
        }
    }
}

/// VESC UART protocol driver
///
/// Not safe for concurrent use; callers sharing one instance across threads
/// must serialize access to the whole instance.
#[derive(Debug)]
pub struct VescUart<T: Transport> {
    transport: T,
    config: DriverConfig,
    decoder: FrameDecoder,
    telemetry: Telemetry,
    setup_values: SetupValues,
    mcconf: McConf,
    decoded_adc: DecodedAdc,
    fw_version: FirmwareVersion,
}

impl<T: Transport> VescUart<T> {
    /// Create a driver with the default 100 ms timeout
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DriverConfig::default())
    }

    pub fn with_config(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            config,
            decoder: FrameDecoder::new(),
            telemetry: Telemetry::default(),
            setup_values: SetupValues::default(),
            mcconf: McConf::default(),
            decoded_adc: DecodedAdc::default(),
            fw_version: FirmwareVersion::default(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Last telemetry snapshot
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn setup_values(&self) -> &SetupValues {
        &self.setup_values
    }

    pub fn mcconf(&self) -> &McConf {
        &self.mcconf
    }

    pub fn decoded_adc(&self) -> &DecodedAdc {
        &self.decoded_adc
    }

    pub fn fw_version(&self) -> &FirmwareVersion {
        &self.fw_version
    }

    /// Request the firmware version
    pub fn get_fw_version(&mut self, target: Target) -> Result<()> {
        self.request(CommandId::FwVersion, target)
    }

    /// Request realtime telemetry
    pub fn get_values(&mut self, target: Target) -> Result<()> {
        self.request(CommandId::GetValues, target)
    }

    /// Request setup-scaled telemetry
    pub fn get_setup_values(&mut self, target: Target) -> Result<()> {
        self.request(CommandId::GetValuesSetup, target)
    }

    /// Request the motor configuration limits
    pub fn get_mcconf(&mut self, target: Target) -> Result<()> {
        self.request(CommandId::GetMcConf, target)
    }

    /// Request the decoded ADC input
    pub fn get_decoded_adc(&mut self, target: Target) -> Result<()> {
        self.request(CommandId::GetDecodedAdc, target)
    }

    /// Drive the motor with `current` amps
    pub fn set_current(&mut self, current: f32, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetCurrent, target);
        payload.put_f32_as_i32(current, 1000.0);
        self.send_payload(&payload)
    }

    /// Brake the motor with `current` amps
    pub fn set_brake_current(&mut self, current: f32, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetCurrentBrake, target);
        payload.put_f32_as_i32(current, 1000.0);
        self.send_payload(&payload)
    }

    /// Run the motor at `rpm` electrical RPM
    pub fn set_rpm(&mut self, rpm: f32, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetRpm, target);
        payload.put_f32_as_i32(rpm, 1.0);
        self.send_payload(&payload)
    }

    /// Run the motor at a duty cycle between -1.0 and 1.0
    pub fn set_duty(&mut self, duty: f32, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetDuty, target);
        payload.put_f32_as_i32(duty, 100_000.0);
        self.send_payload(&payload)
    }

    /// Reset the controller's command timeout
    pub fn send_keepalive(&mut self, target: Target) -> Result<()> {
        let payload = envelope(CommandId::Alive, target);
        self.send_payload(&payload)
    }

    /// Push joystick state to the nunchuk application
    pub fn set_nunchuck(&mut self, chuck: &Nunchuck, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetChuckData, target);
        encode_fields(&mut payload, chuck);
        payload.put_slice(&CHUCK_ACCEL_PADDING);
        self.send_payload(&payload)
    }

    /// Temporarily override motor configuration limits
    ///
    /// With `flags.ack` set the controller answers; the reply is discarded
    /// before the next request.
    pub fn set_mcconf(&mut self, flags: ConfWriteFlags, conf: &McConf, target: Target) -> Result<()> {
        let mut payload = envelope(CommandId::SetMcConfTemp, target);
        encode_fields(&mut payload, &flags);
        encode_fields(&mut payload, conf);
        self.send_payload(&payload)
    }

    /// Apply a relative limit profile
    pub fn set_local_profile(
        &mut self,
        flags: ConfWriteFlags,
        profile: &LocalProfile,
        target: Target,
    ) -> Result<()> {
        let mut payload = envelope(CommandId::SetMcConfTempSetup, target);
        encode_fields(&mut payload, &flags);
        encode_fields(&mut payload, profile);
        self.send_payload(&payload)
    }

    /// Send a request and decode its reply
    fn request(&mut self, command: CommandId, target: Target) -> Result<()> {
        // `None` when the timeout is too large to represent: wait indefinitely
        let deadline = Instant::now().checked_add(self.config.timeout);
        self.drain_input(deadline)?;

        let payload = envelope(command, target);
        self.send_payload(&payload)?;

        let reply = self.receive_payload(deadline)?;
        debug!("Received {:?} reply ({} bytes)", command, reply.len());
        self.dispatch(command, &reply)
    }

    /// Frame and write a payload
    fn send_payload(&mut self, payload: &PayloadWriter) -> Result<()> {
        let frame = encode_frame(payload.as_slice())?;
        let written = self.transport.write(&frame)?;

        if written != frame.len() {
            warn!("Short write: {} of {} bytes", written, frame.len());
            return Err(VescError::ShortWrite {
                expected: frame.len(),
                written,
            });
        }

        debug!("Sent frame ({} bytes, payload {} bytes)", frame.len(), payload.len());
        Ok(())
    }

    /// Discard bytes left over from earlier exchanges
    fn drain_input(&mut self, deadline: Option<Instant>) -> Result<()> {
        let mut discarded = 0usize;

        while self.transport.available()? > 0 {
            if self.transport.read_byte()?.is_none() {
                break;
            }
            discarded += 1;

            if expired(deadline) {
                warn!("Input still arriving after discarding {} bytes", discarded);
                return Err(self.timeout_error());
            }
        }

        if discarded > 0 {
            debug!("Discarded {} stale bytes before request", discarded);
        }
        Ok(())
    }

    /// Poll the transport until one frame is received or the timeout elapses
    fn receive_payload(&mut self, deadline: Option<Instant>) -> Result<Vec<u8>> {
        self.decoder.reset();

        loop {
            while self.transport.available()? > 0 {
                let Some(byte) = self.transport.read_byte()? else {
                    break;
                };

                match self.decoder.push(byte) {
                    Ok(Some(payload)) => return Ok(payload),
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Discarding received frame: {}", e);
                        self.decoder.reset();
                        return Err(e.into());
                    }
                }
            }

            if expired(deadline) {
                warn!("No reply within {:?}", self.config.timeout);
                self.decoder.reset();
                return Err(self.timeout_error());
            }

            std::thread::sleep(POLL_BACKOFF);
        }
    }

    fn timeout_error(&self) -> VescError {
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
        VescError::Timeout { timeout_ms }
    }

    /// Decode a reply into the snapshot selected by its command id
    fn dispatch(&mut self, expected: CommandId, payload: &[u8]) -> Result<()> {
        let Some((&id, body)) = payload.split_first() else {
            return Err(VescError::ShortPayload {
                command: expected,
                expected: 1,
                actual: 0,
            });
        };

        let unexpected = VescError::UnexpectedReply {
            expected,
            actual: id,
        };
        let Some(reply) = CommandId::from_u8(id) else {
            return Err(unexpected);
        };

        let policy = self.config.commit;
        let mut reader = PayloadReader::new(body);
        let decoded = match reply {
            CommandId::FwVersion => stage(&mut self.fw_version, policy, |fw| {
                decode_fields(&mut reader, fw)?;
                fw.hardware_name = reader.get_cstr();
                Ok(())
            }),
            CommandId::GetValues => stage(&mut self.telemetry, policy, |t| decode_fields(&mut reader, t)),
            CommandId::GetValuesSetup => stage(&mut self.setup_values, policy, |t| decode_fields(&mut reader, t)),
            CommandId::GetMcConf => stage(&mut self.mcconf, policy, |t| decode_fields(&mut reader, t)),
            CommandId::GetDecodedAdc => stage(&mut self.decoded_adc, policy, |t| decode_fields(&mut reader, t)),
            _ => return Err(unexpected),
        };

        if reply != expected {
            return Err(unexpected);
        }

        if decoded.is_err() {
            return Err(VescError::ShortPayload {
                command: reply,
                expected: min_reply_len(reply),
                actual: payload.len(),
            });
        }
        Ok(())
    }
}

/// Start a payload: optional CAN forwarding prefix, then the command id
fn envelope(command: CommandId, target: Target) -> PayloadWriter {
    let mut payload = PayloadWriter::new();
    if let Target::Can(id) = target {
        payload.put_u8(CommandId::ForwardCan.as_u8());
        payload.put_u8(id);
    }
    payload.put_u8(command.as_u8());
    payload
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Run `decode` against `target` according to the commit policy
fn stage<L, F>(target: &mut L, policy: CommitPolicy, decode: F) -> std::result::Result<(), ShortRead>
where
    L: Clone,
    F: FnOnce(&mut L) -> std::result::Result<(), ShortRead>,
{
    match policy {
        CommitPolicy::Partial => decode(target),
        CommitPolicy::AllOrNothing => {
            let mut staged = target.clone();
            decode(&mut staged)?;
            *target = staged;
            Ok(())
        }
    }
}

/// Smallest complete reply payload (id included) for a request
fn min_reply_len(command: CommandId) -> usize {
    1 + match command {
        CommandId::FwVersion => FirmwareVersion::wire_size(),
        CommandId::GetValues => Telemetry::wire_size(),
        CommandId::GetValuesSetup => SetupValues::wire_size(),
        CommandId::GetMcConf => McConf::wire_size(),
        CommandId::GetDecodedAdc => DecodedAdc::wire_size(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;
    use crate::protocol::commands::FaultCode;
    use crate::protocol::frame::decode_frame;
    use crate::transport::port_trait::mocks::ScriptedTransport;
    use crate::transport::port_trait::MockTransport;
    use std::io;

    fn fast_config(commit: CommitPolicy) -> DriverConfig {
        DriverConfig {
            timeout: Duration::from_millis(5),
            commit,
        }
    }

    fn driver(commit: CommitPolicy) -> (VescUart<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new();
        (VescUart::with_config(transport.clone(), fast_config(commit)), transport)
    }

    fn reply_frame(command: CommandId, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![command.as_u8()];
        payload.extend_from_slice(body);
        encode_frame(&payload).unwrap()
    }

    fn sent_payloads(transport: &ScriptedTransport) -> Vec<Vec<u8>> {
        transport
            .get_written_data()
            .iter()
            .map(|frame| decode_frame(frame).unwrap().0)
            .collect()
    }

    /// GetValues body with hand-scaled wire integers
    fn telemetry_body(controller_id: u8) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        w.put_i16(325); // temp_mosfet 32.5
        w.put_i16(-41); // temp_motor -4.1
        w.put_i32(1234); // avg_motor_current 12.34
        w.put_i32(-250); // avg_input_current -2.5
        w.put_i32(100); // avg_id 1.0
        w.put_i32(1200); // avg_iq 12.0
        w.put_i16(456); // duty 0.456
        w.put_i32(-15_000); // rpm
        w.put_i16(483); // input_voltage 48.3
        w.put_i32(12_345); // amp_hours 1.2345
        w.put_i32(500); // amp_hours_charged 0.05
        w.put_i32(600_000); // watt_hours 60.0
        w.put_i32(25_000); // watt_hours_charged 2.5
        w.put_i32(987_654); // tachometer
        w.put_i32(1_000_000); // tachometer_abs
        w.put_u8(6); // fault
        w.put_i32(90_500_000); // pid_pos 90.5
        w.put_u8(controller_id);
        w.freeze().to_vec()
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-4, "{} != {}", actual, expected);
    }

    #[test]
    fn test_get_values_over_can_populates_telemetry() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::GetValues, &telemetry_body(9)));

        vesc.get_values(Target::Can(0)).unwrap();

        assert_eq!(sent_payloads(&transport), vec![vec![34, 0, 4]]);

        let t = vesc.telemetry();
        assert_close(t.temp_mosfet, 32.5);
        assert_close(t.temp_motor, -4.1);
        assert_close(t.avg_motor_current, 12.34);
        assert_close(t.avg_input_current, -2.5);
        assert_close(t.avg_id, 1.0);
        assert_close(t.avg_iq, 12.0);
        assert_close(t.duty_cycle_now, 0.456);
        assert_close(t.rpm, -15_000.0);
        assert_close(t.input_voltage, 48.3);
        assert_close(t.amp_hours, 1.2345);
        assert_close(t.amp_hours_charged, 0.05);
        assert_close(t.watt_hours, 60.0);
        assert_close(t.watt_hours_charged, 2.5);
        assert_eq!(t.tachometer, 987_654);
        assert_eq!(t.tachometer_abs, 1_000_000);
        assert_eq!(t.fault, FaultCode(6));
        assert_close(t.pid_pos, 90.5);
        assert_eq!(t.controller_id, 9);
    }

    #[test]
    fn test_local_request_has_no_forward_prefix() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::GetValues, &telemetry_body(1)));

        vesc.get_values(Target::Local).unwrap();

        assert_eq!(transport.get_written_data(), vec![vec![0x02, 0x01, 0x04, 0x40, 0x84, 0x03]]);
    }

    #[test]
    fn test_timeout_leaves_snapshot_untouched() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);

        let started = Instant::now();
        let result = vesc.get_values(Target::Local);

        assert!(matches!(result, Err(VescError::Timeout { timeout_ms: 5 })));
        assert!(started.elapsed() >= Duration::from_millis(5));
        assert_eq!(vesc.telemetry(), &Telemetry::default());
        assert_eq!(transport.get_written_data().len(), 1);
    }

    #[test]
    fn test_short_reply_partial_commit() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::GetValues, &telemetry_body(7)));
        vesc.get_values(Target::Local).unwrap();

        // Same layout with new values, missing the final controller id byte
        let mut body = telemetry_body(0);
        body[0..2].copy_from_slice(&500i16.to_be_bytes());
        body.pop();
        transport.queue_reply(reply_frame(CommandId::GetValues, &body));

        let result = vesc.get_values(Target::Local);

        match result {
            Err(VescError::ShortPayload {
                command,
                expected,
                actual,
            }) => {
                assert_eq!(command, CommandId::GetValues);
                assert_eq!(expected, 59);
                assert_eq!(actual, 58);
            }
            other => panic!("Expected ShortPayload, got: {:?}", other),
        }
        assert_close(vesc.telemetry().temp_mosfet, 50.0);
        assert_close(vesc.telemetry().pid_pos, 90.5);
        assert_eq!(vesc.telemetry().controller_id, 7);
    }

    #[test]
    fn test_short_reply_all_or_nothing() {
        let (mut vesc, transport) = driver(CommitPolicy::AllOrNothing);
        transport.queue_reply(reply_frame(CommandId::GetValues, &telemetry_body(7)));
        vesc.get_values(Target::Local).unwrap();
        let before = vesc.telemetry().clone();

        let mut body = telemetry_body(0);
        body[0..2].copy_from_slice(&500i16.to_be_bytes());
        body.pop();
        transport.queue_reply(reply_frame(CommandId::GetValues, &body));

        assert!(matches!(
            vesc.get_values(Target::Local),
            Err(VescError::ShortPayload { .. })
        ));
        assert_eq!(vesc.telemetry(), &before);
    }

    #[test]
    fn test_crc_failure_reported() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let mut frame = reply_frame(CommandId::GetValues, &telemetry_body(1));
        frame[5] ^= 0x10;
        transport.queue_reply(frame);

        let result = vesc.get_values(Target::Local);

        assert!(matches!(
            result,
            Err(VescError::Integrity(FrameError::CrcMismatch { .. }))
        ));
        assert_eq!(vesc.telemetry(), &Telemetry::default());
    }

    #[test]
    fn test_bad_stop_byte_reported() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let mut frame = reply_frame(CommandId::FwVersion, &[5, 2]);
        let last = frame.len() - 1;
        frame[last] = 0xAA;
        transport.queue_reply(frame);

        assert!(matches!(
            vesc.get_fw_version(Target::Local),
            Err(VescError::Integrity(FrameError::InvalidStop(0xAA)))
        ));
    }

    #[test]
    fn test_next_call_after_failure_starts_fresh() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(vec![0x02, 0x03, 0x04]); // truncated frame
        assert!(vesc.get_values(Target::Local).is_err());

        transport.queue_reply(reply_frame(CommandId::GetValues, &telemetry_body(4)));
        vesc.get_values(Target::Local).unwrap();
        assert_eq!(vesc.telemetry().controller_id, 4);
    }

    #[test]
    fn test_stale_bytes_drained_before_request() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.inject(&reply_frame(CommandId::SetMcConfTemp, &[]));
        transport.queue_reply(reply_frame(CommandId::FwVersion, &[6, 5]));

        vesc.get_fw_version(Target::Local).unwrap();

        assert_eq!(vesc.fw_version().major, 6);
        assert_eq!(vesc.fw_version().minor, 5);
        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn test_fw_version_with_hardware_name() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::FwVersion, b"\x05\x03410\0\x01\x02"));

        vesc.get_fw_version(Target::Can(5)).unwrap();

        assert_eq!(sent_payloads(&transport), vec![vec![34, 5, 0]]);
        assert_eq!(
            vesc.fw_version(),
            &FirmwareVersion {
                major: 5,
                minor: 3,
                hardware_name: Some("410".to_string()),
            }
        );
    }

    #[test]
    fn test_get_setup_values() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let expected = SetupValues {
            temp_mosfet: 40.5,
            speed: 8.25,
            battery_level: 0.75,
            distance: 1234.5,
            num_vescs: 2,
            odometer: 99_000,
            uptime_ms: 3_600_000,
            fault: FaultCode(2),
            ..Default::default()
        };
        let mut body = PayloadWriter::new();
        encode_fields(&mut body, &expected);
        transport.queue_reply(reply_frame(CommandId::GetValuesSetup, body.as_slice()));

        vesc.get_setup_values(Target::Local).unwrap();

        assert_eq!(vesc.setup_values(), &expected);
    }

    #[test]
    fn test_get_mcconf() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let expected = McConf {
            current_min: -60.0,
            current_max: 60.0,
            erpm_min: -100_000.0,
            erpm_max: 100_000.0,
            duty_min: 0.005,
            duty_max: 0.95,
            watt_min: -1500.0,
            watt_max: 1500.0,
            in_current_min: -20.0,
            in_current_max: 40.0,
            motor_poles: 14,
            gear_ratio: 3.5,
            wheel_diameter: 0.083,
        };
        let mut body = PayloadWriter::new();
        encode_fields(&mut body, &expected);
        transport.queue_reply(reply_frame(CommandId::GetMcConf, body.as_slice()));

        vesc.get_mcconf(Target::Local).unwrap();

        let conf = vesc.mcconf();
        assert_close(conf.current_min, -60.0);
        assert_close(conf.duty_min, 0.005);
        assert_close(conf.duty_max, 0.95);
        assert_eq!(conf.motor_poles, 14);
        assert_close(conf.gear_ratio, 3.5);
        assert_close(conf.wheel_diameter, 0.083);
    }

    #[test]
    fn test_get_decoded_adc() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let mut body = PayloadWriter::new();
        body.put_i32(250_000);
        body.put_i32(825_000);
        body.put_i32(0);
        body.put_i32(3_300_000);
        transport.queue_reply(reply_frame(CommandId::GetDecodedAdc, body.as_slice()));

        vesc.get_decoded_adc(Target::Local).unwrap();

        let adc = vesc.decoded_adc();
        assert_eq!(adc.decoded_level, 250_000);
        assert_close(adc.level(), 0.25);
        assert_close(adc.volts2(), 3.3);
    }

    #[test]
    fn test_mismatched_reply_decoded_but_reported() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::FwVersion, &[6, 0]));

        let result = vesc.get_values(Target::Local);

        assert!(matches!(
            result,
            Err(VescError::UnexpectedReply {
                expected: CommandId::GetValues,
                actual: 0
            })
        ));
        assert_eq!(vesc.fw_version().major, 6);
    }

    #[test]
    fn test_unknown_reply_id() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(encode_frame(&[0xEE, 1, 2, 3]).unwrap());

        assert!(matches!(
            vesc.get_decoded_adc(Target::Local),
            Err(VescError::UnexpectedReply { actual: 0xEE, .. })
        ));
        assert_eq!(vesc.decoded_adc(), &DecodedAdc::default());
    }

    #[test]
    fn test_empty_reply_payload() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(encode_frame(&[]).unwrap());

        assert!(matches!(
            vesc.get_values(Target::Local),
            Err(VescError::ShortPayload { actual: 0, .. })
        ));
    }

    #[test]
    fn test_actuation_payloads() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);

        vesc.set_current(10.5, Target::Local).unwrap();
        vesc.set_brake_current(3.0, Target::Local).unwrap();
        vesc.set_rpm(-1500.0, Target::Local).unwrap();
        vesc.set_duty(0.5, Target::Local).unwrap();
        vesc.send_keepalive(Target::Can(3)).unwrap();

        assert_eq!(
            sent_payloads(&transport),
            vec![
                vec![6, 0x00, 0x00, 0x29, 0x04],
                vec![7, 0x00, 0x00, 0x0B, 0xB8],
                vec![8, 0xFF, 0xFF, 0xFA, 0x24],
                vec![5, 0x00, 0x00, 0xC3, 0x50],
                vec![34, 3, 30],
            ]
        );
    }

    #[test]
    fn test_nunchuck_payload() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let chuck = Nunchuck {
            value_x: 10,
            value_y: 200,
            lower_button: true,
            upper_button: false,
        };

        vesc.set_nunchuck(&chuck, Target::Can(1)).unwrap();

        assert_eq!(
            sent_payloads(&transport),
            vec![vec![34, 1, 35, 10, 200, 1, 0, 0, 0, 0, 0, 0, 0]]
        );
    }

    #[test]
    fn test_set_mcconf_payload() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let flags = ConfWriteFlags {
            store: false,
            forward_can: true,
            ack: false,
            divide_by_controllers: true,
        };
        let conf = McConf {
            current_max: 30.0,
            motor_poles: 7,
            ..Default::default()
        };

        vesc.set_mcconf(flags, &conf, Target::Local).unwrap();

        let payload = &sent_payloads(&transport)[0];
        assert_eq!(payload.len(), 1 + 4 + McConf::wire_size());
        assert_eq!(&payload[..5], &[48, 0, 1, 0, 1]);
        // current_max follows current_min
        assert_eq!(&payload[9..13], &30.0f32.to_bits().to_be_bytes());
        assert_eq!(payload[45], 7);
    }

    #[test]
    fn test_set_local_profile_payload() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        let profile = LocalProfile {
            current_min_rel: 1.0,
            current_max_rel: 0.5,
            speed_max_reverse: -5.0,
            speed_max: 12.0,
            duty_min: 0.005,
            duty_max: 0.95,
            watt_min: -1000.0,
            watt_max: 2000.0,
        };

        vesc.set_local_profile(ConfWriteFlags::default(), &profile, Target::Local)
            .unwrap();

        let payload = &sent_payloads(&transport)[0];
        assert_eq!(payload.len(), 1 + 4 + 32);
        assert_eq!(payload[0], 49);
        let mut reader = PayloadReader::new(&payload[5..]);
        let mut decoded = LocalProfile::default();
        decode_fields(&mut reader, &mut decoded).unwrap();
        assert_close(decoded.current_max_rel, 0.5);
        assert_close(decoded.speed_max_reverse, -5.0);
        assert_close(decoded.duty_min, 0.005);
        assert_close(decoded.watt_max, 2000.0);
    }

    #[test]
    fn test_short_write_reported() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.set_accept_limit(3);

        let result = vesc.set_current(1.0, Target::Local);

        assert!(matches!(
            result,
            Err(VescError::ShortWrite {
                expected: 10,
                written: 3
            })
        ));
    }

    #[test]
    fn test_short_write_aborts_request() {
        let mut mock = MockTransport::new();
        mock.expect_available().returning(|| Ok(0));
        mock.expect_write().times(1).returning(|_| Ok(2));
        mock.expect_read_byte().never();

        let mut vesc = VescUart::with_config(mock, fast_config(CommitPolicy::Partial));

        assert!(matches!(
            vesc.get_values(Target::Local),
            Err(VescError::ShortWrite {
                expected: 6,
                written: 2
            })
        ));
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut mock = MockTransport::new();
        mock.expect_available().returning(|| Ok(0));
        mock.expect_write()
            .returning(|_| Err(io::Error::new(io::ErrorKind::BrokenPipe, "Mock write error")));

        let mut vesc = VescUart::new(mock);

        assert!(matches!(
            vesc.send_keepalive(Target::Local),
            Err(VescError::Io(_))
        ));
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let transport = ScriptedTransport::new();
        let config = DriverConfig {
            timeout: Duration::MAX,
            commit: CommitPolicy::Partial,
        };
        let mut vesc = VescUart::with_config(transport.clone(), config);
        transport.queue_reply(reply_frame(CommandId::FwVersion, &[6, 2]));

        vesc.get_fw_version(Target::Local).unwrap();
        assert_eq!(vesc.fw_version().minor, 2);
    }

    #[test]
    fn test_endless_input_bounded_by_timeout() {
        let mut mock = MockTransport::new();
        mock.expect_available().returning(|| Ok(1));
        mock.expect_read_byte().returning(|| Ok(Some(0x55)));
        mock.expect_write().never();

        let mut vesc = VescUart::with_config(mock, fast_config(CommitPolicy::Partial));

        let started = Instant::now();
        assert!(matches!(
            vesc.get_values(Target::Local),
            Err(VescError::Timeout { timeout_ms: 5 })
        ));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_short_mismatched_reply_reports_unexpected_id() {
        let (mut vesc, transport) = driver(CommitPolicy::Partial);
        transport.queue_reply(reply_frame(CommandId::FwVersion, &[6]));

        assert!(matches!(
            vesc.get_values(Target::Local),
            Err(VescError::UnexpectedReply {
                expected: CommandId::GetValues,
                actual: 0
            })
        ));
    }

    #[test]
    fn test_target_from_optional_can_id() {
        assert_eq!(Target::from(None), Target::Local);
        assert_eq!(Target::from(Some(7)), Target::Can(7));
    }

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.commit, CommitPolicy::Partial);
    }
}
