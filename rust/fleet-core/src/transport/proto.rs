//! Wire messages for the `fleet.transport.FleetService/Join` stream.
//!
//! The orchestrator sends [`ServerMessage`]s and the worker answers with
//! [`ClientMessage`]s. Each carries exactly one instruction or reply in its
//! `msg` oneof.

use std::collections::HashMap;

use prost::bytes::Bytes;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Scalar {
    #[prost(oneof = "scalar::Scalar", tags = "1, 8, 13, 14, 15")]
    pub scalar: Option<scalar::Scalar>,
}

pub mod scalar {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Scalar {
        #[prost(double, tag = "1")]
        Double(f64),
        #[prost(sint64, tag = "8")]
        Sint64(i64),
        #[prost(bool, tag = "13")]
        Bool(bool),
        #[prost(string, tag = "14")]
        String(::prost::alloc::string::String),
        #[prost(bytes = "vec", tag = "15")]
        Bytes(::prost::alloc::vec::Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Parameters {
    #[prost(bytes = "bytes", repeated, tag = "1")]
    pub tensors: Vec<Bytes>,
    #[prost(string, tag = "2")]
    pub tensor_type: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    GetPropertiesNotImplemented = 1,
    GetParametersNotImplemented = 2,
    FitNotImplemented = 3,
    EvaluateNotImplemented = 4,
    QueryNotImplemented = 5,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(enumeration = "Code", tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Reason {
    Unknown = 0,
    Reconnect = 1,
    PowerDisconnected = 2,
    WifiUnavailable = 3,
    Ack = 4,
}

// Instructions

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReconnectIns {
    #[prost(uint64, optional, tag = "1")]
    pub seconds: Option<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPropertiesIns {
    #[prost(map = "string, message", tag = "1")]
    pub config: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetParametersIns {
    #[prost(map = "string, message", tag = "1")]
    pub config: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FitIns {
    #[prost(message, optional, tag = "1")]
    pub parameters: Option<Parameters>,
    #[prost(map = "string, message", tag = "2")]
    pub config: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluateIns {
    #[prost(message, optional, tag = "1")]
    pub parameters: Option<Parameters>,
    #[prost(map = "string, message", tag = "2")]
    pub config: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryIns {
    #[prost(string, tag = "1")]
    pub question: String,
    #[prost(sint64, repeated, tag = "2")]
    pub values: Vec<i64>,
}

// Replies

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DisconnectRes {
    #[prost(enumeration = "Reason", tag = "1")]
    pub reason: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPropertiesRes {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(map = "string, message", tag = "2")]
    pub properties: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetParametersRes {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(message, optional, tag = "2")]
    pub parameters: Option<Parameters>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FitRes {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(message, optional, tag = "2")]
    pub parameters: Option<Parameters>,
    #[prost(uint64, tag = "3")]
    pub num_examples: u64,
    #[prost(map = "string, message", tag = "4")]
    pub metrics: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EvaluateRes {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(double, tag = "2")]
    pub loss: f64,
    #[prost(uint64, tag = "3")]
    pub num_examples: u64,
    #[prost(map = "string, message", tag = "4")]
    pub metrics: HashMap<String, Scalar>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryRes {
    #[prost(message, optional, tag = "1")]
    pub status: Option<Status>,
    #[prost(string, tag = "2")]
    pub response: String,
    #[prost(sint64, tag = "3")]
    pub answer: i64,
}

// Stream frames

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerMessage {
    #[prost(oneof = "server_message::Msg", tags = "1, 2, 3, 4, 5, 6")]
    pub msg: Option<server_message::Msg>,
}

pub mod server_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        ReconnectIns(super::ReconnectIns),
        #[prost(message, tag = "2")]
        GetPropertiesIns(super::GetPropertiesIns),
        #[prost(message, tag = "3")]
        GetParametersIns(super::GetParametersIns),
        #[prost(message, tag = "4")]
        FitIns(super::FitIns),
        #[prost(message, tag = "5")]
        EvaluateIns(super::EvaluateIns),
        #[prost(message, tag = "6")]
        QueryIns(super::QueryIns),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientMessage {
    #[prost(oneof = "client_message::Msg", tags = "1, 2, 3, 4, 5, 6")]
    pub msg: Option<client_message::Msg>,
}

pub mod client_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        DisconnectRes(super::DisconnectRes),
        #[prost(message, tag = "2")]
        GetPropertiesRes(super::GetPropertiesRes),
        #[prost(message, tag = "3")]
        GetParametersRes(super::GetParametersRes),
        #[prost(message, tag = "4")]
        FitRes(super::FitRes),
        #[prost(message, tag = "5")]
        EvaluateRes(super::EvaluateRes),
        #[prost(message, tag = "6")]
        QueryRes(super::QueryRes),
    }
}

include!(concat!(env!("OUT_DIR"), "/fleet.transport.FleetService.rs"));
