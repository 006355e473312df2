//! ---
//! twin_section: "11-simulation"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Telemetry frame layout and channel addressing."
//! twin_version: "v0.1.0"
//! twin_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synthetic sensor snapshot produced once per simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp: DateTime<Utc>,
    pub j1_angle: f64,
    pub j2_angle: f64,
    pub j3_angle: f64,
    pub j4_angle: f64,
    pub j5_angle: f64,
    pub j6_angle: f64,
    pub j1_torque: f64,
    pub j2_torque: f64,
    pub j3_torque: f64,
    pub ee_x: f64,
    pub ee_y: f64,
    pub ee_z: f64,
    pub motor_temp: f64,
    pub power: f64,
    pub current: f64,
    pub rpm: f64,
    pub payload: f64,
    pub cycle_time: f64,
    pub anomaly_score: f64,
}

impl TelemetryFrame {
    /// Frame with every channel at zero, used as a base before a rule table fills it.
    pub fn zeroed(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            j1_angle: 0.0,
            j2_angle: 0.0,
            j3_angle: 0.0,
            j4_angle: 0.0,
            j5_angle: 0.0,
            j6_angle: 0.0,
            j1_torque: 0.0,
            j2_torque: 0.0,
            j3_torque: 0.0,
            ee_x: 0.0,
            ee_y: 0.0,
            ee_z: 0.0,
            motor_temp: 0.0,
            power: 0.0,
            current: 0.0,
            rpm: 0.0,
            payload: 0.0,
            cycle_time: 0.0,
            anomaly_score: 0.0,
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        *self.slot(channel)
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        *self.slot_mut(channel) = value;
    }

    fn slot(&self, channel: Channel) -> &f64 {
        match channel {
            Channel::J1Angle => &self.j1_angle,
            Channel::J2Angle => &self.j2_angle,
            Channel::J3Angle => &self.j3_angle,
            Channel::J4Angle => &self.j4_angle,
            Channel::J5Angle => &self.j5_angle,
            Channel::J6Angle => &self.j6_angle,
            Channel::J1Torque => &self.j1_torque,
            Channel::J2Torque => &self.j2_torque,
            Channel::J3Torque => &self.j3_torque,
            Channel::EeX => &self.ee_x,
            Channel::EeY => &self.ee_y,
            Channel::EeZ => &self.ee_z,
            Channel::MotorTemp => &self.motor_temp,
            Channel::Power => &self.power,
            Channel::Current => &self.current,
            Channel::Rpm => &self.rpm,
            Channel::Payload => &self.payload,
            Channel::CycleTime => &self.cycle_time,
            Channel::AnomalyScore => &self.anomaly_score,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::J1Angle => &mut self.j1_angle,
            Channel::J2Angle => &mut self.j2_angle,
            Channel::J3Angle => &mut self.j3_angle,
            Channel::J4Angle => &mut self.j4_angle,
            Channel::J5Angle => &mut self.j5_angle,
            Channel::J6Angle => &mut self.j6_angle,
            Channel::J1Torque => &mut self.j1_torque,
            Channel::J2Torque => &mut self.j2_torque,
            Channel::J3Torque => &mut self.j3_torque,
            Channel::EeX => &mut self.ee_x,
            Channel::EeY => &mut self.ee_y,
            Channel::EeZ => &mut self.ee_z,
            Channel::MotorTemp => &mut self.motor_temp,
            Channel::Power => &mut self.power,
            Channel::Current => &mut self.current,
            Channel::Rpm => &mut self.rpm,
            Channel::Payload => &mut self.payload,
            Channel::CycleTime => &mut self.cycle_time,
            Channel::AnomalyScore => &mut self.anomaly_score,
        }
    }
}

/// Numeric channels carried by a [`TelemetryFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    J1Angle,
    J2Angle,
    J3Angle,
    J4Angle,
    J5Angle,
    J6Angle,
    J1Torque,
    J2Torque,
    J3Torque,
    EeX,
    EeY,
    EeZ,
    MotorTemp,
    Power,
    Current,
    Rpm,
    Payload,
    CycleTime,
    AnomalyScore,
}

impl Channel {
    pub const ALL: [Channel; 19] = [
        Channel::J1Angle,
        Channel::J2Angle,
        Channel::J3Angle,
        Channel::J4Angle,
        Channel::J5Angle,
        Channel::J6Angle,
        Channel::J1Torque,
        Channel::J2Torque,
        Channel::J3Torque,
        Channel::EeX,
        Channel::EeY,
        Channel::EeZ,
        Channel::MotorTemp,
        Channel::Power,
        Channel::Current,
        Channel::Rpm,
        Channel::Payload,
        Channel::CycleTime,
        Channel::AnomalyScore,
    ];

    /// Field name used on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Channel::J1Angle => "j1_angle",
            Channel::J2Angle => "j2_angle",
            Channel::J3Angle => "j3_angle",
            Channel::J4Angle => "j4_angle",
            Channel::J5Angle => "j5_angle",
            Channel::J6Angle => "j6_angle",
            Channel::J1Torque => "j1_torque",
            Channel::J2Torque => "j2_torque",
            Channel::J3Torque => "j3_torque",
            Channel::EeX => "ee_x",
            Channel::EeY => "ee_y",
            Channel::EeZ => "ee_z",
            Channel::MotorTemp => "motor_temp",
            Channel::Power => "power",
            Channel::Current => "current",
            Channel::Rpm => "rpm",
            Channel::Payload => "payload",
            Channel::CycleTime => "cycle_time",
            Channel::AnomalyScore => "anomaly_score",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
