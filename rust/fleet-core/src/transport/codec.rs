//! Conversions between typed records and wire messages.
//!
//! Encoding never fails. Decoding fails with `Serialization` when a frame or
//! a scalar carries no value, a reply has no status, or an enumeration value
//! is unknown.

use std::collections::HashMap;

use super::proto::{self, client_message, server_message};
use crate::envelope::{Instruction, Reply};
use crate::error::{FleetError, Result};
use crate::protocol::{
    Code, Config, DisconnectReason, DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes,
    GetParametersIns, GetParametersRes, GetPropertiesIns, GetPropertiesRes, Parameters, QueryIns,
    QueryRes, ReconnectIns, Scalar, Status,
};

// Scalars and maps

impl From<Scalar> for proto::Scalar {
    fn from(value: Scalar) -> Self {
        let scalar = match value {
            Scalar::Bool(v) => proto::scalar::Scalar::Bool(v),
            Scalar::Bytes(v) => proto::scalar::Scalar::Bytes(v),
            Scalar::Float(v) => proto::scalar::Scalar::Double(v),
            Scalar::Int(v) => proto::scalar::Scalar::Sint64(v),
            Scalar::Str(v) => proto::scalar::Scalar::String(v),
        };
        Self {
            scalar: Some(scalar),
        }
    }
}

impl TryFrom<proto::Scalar> for Scalar {
    type Error = FleetError;

    fn try_from(value: proto::Scalar) -> Result<Self> {
        match value.scalar {
            Some(proto::scalar::Scalar::Bool(v)) => Ok(Self::Bool(v)),
            Some(proto::scalar::Scalar::Bytes(v)) => Ok(Self::Bytes(v)),
            Some(proto::scalar::Scalar::Double(v)) => Ok(Self::Float(v)),
            Some(proto::scalar::Scalar::Sint64(v)) => Ok(Self::Int(v)),
            Some(proto::scalar::Scalar::String(v)) => Ok(Self::Str(v)),
            None => Err(FleetError::serialization("scalar carries no value")),
        }
    }
}

fn encode_map(map: Config) -> HashMap<String, proto::Scalar> {
    map.into_iter().map(|(k, v)| (k, v.into())).collect()
}

fn decode_map(map: HashMap<String, proto::Scalar>) -> Result<Config> {
    map.into_iter()
        .map(|(k, v)| {
            let value = Scalar::try_from(v).map_err(|_| {
                FleetError::serialization(format!("entry '{}' carries no value", k))
            })?;
            Ok((k, value))
        })
        .collect()
}

// Parameters and status

impl From<Parameters> for proto::Parameters {
    fn from(parameters: Parameters) -> Self {
        Self {
            tensors: parameters.tensors,
            tensor_type: parameters.tensor_type,
        }
    }
}

impl From<proto::Parameters> for Parameters {
    fn from(parameters: proto::Parameters) -> Self {
        Self {
            tensors: parameters.tensors,
            tensor_type: parameters.tensor_type,
        }
    }
}

fn decode_parameters(parameters: Option<proto::Parameters>) -> Parameters {
    parameters.map(Parameters::from).unwrap_or_default()
}

impl From<Code> for proto::Code {
    fn from(code: Code) -> Self {
        match code {
            Code::Ok => Self::Ok,
            Code::GetPropertiesNotImplemented => Self::GetPropertiesNotImplemented,
            Code::GetParametersNotImplemented => Self::GetParametersNotImplemented,
            Code::FitNotImplemented => Self::FitNotImplemented,
            Code::EvaluateNotImplemented => Self::EvaluateNotImplemented,
            Code::QueryNotImplemented => Self::QueryNotImplemented,
        }
    }
}

impl From<proto::Code> for Code {
    fn from(code: proto::Code) -> Self {
        match code {
            proto::Code::Ok => Self::Ok,
            proto::Code::GetPropertiesNotImplemented => Self::GetPropertiesNotImplemented,
            proto::Code::GetParametersNotImplemented => Self::GetParametersNotImplemented,
            proto::Code::FitNotImplemented => Self::FitNotImplemented,
            proto::Code::EvaluateNotImplemented => Self::EvaluateNotImplemented,
            proto::Code::QueryNotImplemented => Self::QueryNotImplemented,
        }
    }
}

impl From<Status> for proto::Status {
    fn from(status: Status) -> Self {
        Self {
            code: proto::Code::from(status.code) as i32,
            message: status.message,
        }
    }
}

fn decode_status(status: Option<proto::Status>) -> Result<Status> {
    let status = status.ok_or_else(|| FleetError::serialization("reply carries no status"))?;
    let code = proto::Code::try_from(status.code)
        .map_err(|_| FleetError::serialization(format!("unknown status code {}", status.code)))?;
    Ok(Status::new(code.into(), status.message))
}

impl From<DisconnectReason> for proto::Reason {
    fn from(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::Unknown => Self::Unknown,
            DisconnectReason::Reconnect => Self::Reconnect,
            DisconnectReason::PowerDisconnected => Self::PowerDisconnected,
            DisconnectReason::WifiUnavailable => Self::WifiUnavailable,
            DisconnectReason::Ack => Self::Ack,
        }
    }
}

impl From<i32> for DisconnectReason {
    fn from(value: i32) -> Self {
        match proto::Reason::try_from(value).unwrap_or(proto::Reason::Unknown) {
            proto::Reason::Unknown => Self::Unknown,
            proto::Reason::Reconnect => Self::Reconnect,
            proto::Reason::PowerDisconnected => Self::PowerDisconnected,
            proto::Reason::WifiUnavailable => Self::WifiUnavailable,
            proto::Reason::Ack => Self::Ack,
        }
    }
}

// Instructions

impl From<Instruction> for proto::ServerMessage {
    fn from(instruction: Instruction) -> Self {
        use server_message::Msg;

        let msg = match instruction {
            Instruction::Reconnect(ins) => Msg::ReconnectIns(proto::ReconnectIns {
                seconds: ins.seconds,
            }),
            Instruction::GetProperties(ins) => Msg::GetPropertiesIns(proto::GetPropertiesIns {
                config: encode_map(ins.config),
            }),
            Instruction::GetParameters(ins) => Msg::GetParametersIns(proto::GetParametersIns {
                config: encode_map(ins.config),
            }),
            Instruction::Fit(ins) => Msg::FitIns(proto::FitIns {
                parameters: Some(ins.parameters.into()),
                config: encode_map(ins.config),
            }),
            Instruction::Evaluate(ins) => Msg::EvaluateIns(proto::EvaluateIns {
                parameters: Some(ins.parameters.into()),
                config: encode_map(ins.config),
            }),
            Instruction::Query(ins) => Msg::QueryIns(proto::QueryIns {
                question: ins.question,
                values: ins.values,
            }),
        };
        Self { msg: Some(msg) }
    }
}

impl TryFrom<proto::ServerMessage> for Instruction {
    type Error = FleetError;

    fn try_from(message: proto::ServerMessage) -> Result<Self> {
        use server_message::Msg;

        let msg = message
            .msg
            .ok_or_else(|| FleetError::serialization("server message carries no instruction"))?;

        Ok(match msg {
            Msg::ReconnectIns(ins) => Self::Reconnect(ReconnectIns {
                seconds: ins.seconds,
            }),
            Msg::GetPropertiesIns(ins) => Self::GetProperties(GetPropertiesIns {
                config: decode_map(ins.config)?,
            }),
            Msg::GetParametersIns(ins) => Self::GetParameters(GetParametersIns {
                config: decode_map(ins.config)?,
            }),
            Msg::FitIns(ins) => Self::Fit(FitIns {
                parameters: decode_parameters(ins.parameters),
                config: decode_map(ins.config)?,
            }),
            Msg::EvaluateIns(ins) => Self::Evaluate(EvaluateIns {
                parameters: decode_parameters(ins.parameters),
                config: decode_map(ins.config)?,
            }),
            Msg::QueryIns(ins) => Self::Query(QueryIns {
                question: ins.question,
                values: ins.values,
            }),
        })
    }
}

// Replies

impl From<Reply> for proto::ClientMessage {
    fn from(reply: Reply) -> Self {
        use client_message::Msg;

        let msg = match reply {
            Reply::Disconnect(res) => Msg::DisconnectRes(proto::DisconnectRes {
                reason: proto::Reason::from(res.reason) as i32,
            }),
            Reply::GetProperties(res) => Msg::GetPropertiesRes(proto::GetPropertiesRes {
                status: Some(res.status.into()),
                properties: encode_map(res.properties),
            }),
            Reply::GetParameters(res) => Msg::GetParametersRes(proto::GetParametersRes {
                status: Some(res.status.into()),
                parameters: Some(res.parameters.into()),
            }),
            Reply::Fit(res) => Msg::FitRes(proto::FitRes {
                status: Some(res.status.into()),
                parameters: Some(res.parameters.into()),
                num_examples: res.num_examples,
                metrics: encode_map(res.metrics),
            }),
            Reply::Evaluate(res) => Msg::EvaluateRes(proto::EvaluateRes {
                status: Some(res.status.into()),
                loss: res.loss,
                num_examples: res.num_examples,
                metrics: encode_map(res.metrics),
            }),
            Reply::Query(res) => Msg::QueryRes(proto::QueryRes {
                status: Some(res.status.into()),
                response: res.response,
                answer: res.answer,
            }),
        };
        Self { msg: Some(msg) }
    }
}

impl TryFrom<proto::ClientMessage> for Reply {
    type Error = FleetError;

    fn try_from(message: proto::ClientMessage) -> Result<Self> {
        use client_message::Msg;

        let msg = message
            .msg
            .ok_or_else(|| FleetError::serialization("client message carries no reply"))?;

        Ok(match msg {
            Msg::DisconnectRes(res) => Self::Disconnect(DisconnectRes {
                reason: DisconnectReason::from(res.reason),
            }),
            Msg::GetPropertiesRes(res) => Self::GetProperties(GetPropertiesRes {
                status: decode_status(res.status)?,
                properties: decode_map(res.properties)?,
            }),
            Msg::GetParametersRes(res) => Self::GetParameters(GetParametersRes {
                status: decode_status(res.status)?,
                parameters: decode_parameters(res.parameters),
            }),
            Msg::FitRes(res) => Self::Fit(FitRes {
                status: decode_status(res.status)?,
                parameters: decode_parameters(res.parameters),
                num_examples: res.num_examples,
                metrics: decode_map(res.metrics)?,
            }),
            Msg::EvaluateRes(res) => Self::Evaluate(EvaluateRes {
                status: decode_status(res.status)?,
                loss: res.loss,
                num_examples: res.num_examples,
                metrics: decode_map(res.metrics)?,
            }),
            Msg::QueryRes(res) => Self::Query(QueryRes {
                status: decode_status(res.status)?,
                response: res.response,
                answer: res.answer,
            }),
        })
    }
}
