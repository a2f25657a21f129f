//! Tagged messages crossing a worker's bridge.
//!
//! An [`Envelope`] carries exactly one [`Instruction`] (orchestrator to
//! worker) or one [`Reply`] (worker to orchestrator), plus the caller's
//! deadline. New instruction/reply pairs are added here and in the wire
//! oneofs; the bridge itself never looks inside the payload.

use std::time::Duration;

use crate::protocol::{
    DisconnectRes, EvaluateIns, EvaluateRes, FitIns, FitRes, GetParametersIns, GetParametersRes,
    GetPropertiesIns, GetPropertiesRes, QueryIns, QueryRes, ReconnectIns,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    GetProperties(GetPropertiesIns),
    GetParameters(GetParametersIns),
    Fit(FitIns),
    Evaluate(EvaluateIns),
    Reconnect(ReconnectIns),
    Query(QueryIns),
}

impl Instruction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetProperties(_) => "get_properties",
            Self::GetParameters(_) => "get_parameters",
            Self::Fit(_) => "fit",
            Self::Evaluate(_) => "evaluate",
            Self::Reconnect(_) => "reconnect",
            Self::Query(_) => "query",
        }
    }

    /// Kind of the reply a correct worker sends back.
    pub fn expected_reply(&self) -> &'static str {
        match self {
            Self::GetProperties(_) => "get_properties_res",
            Self::GetParameters(_) => "get_parameters_res",
            Self::Fit(_) => "fit_res",
            Self::Evaluate(_) => "evaluate_res",
            Self::Reconnect(_) => "disconnect_res",
            Self::Query(_) => "query_res",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    GetProperties(GetPropertiesRes),
    GetParameters(GetParametersRes),
    Fit(FitRes),
    Evaluate(EvaluateRes),
    Disconnect(DisconnectRes),
    Query(QueryRes),
}

impl Reply {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetProperties(_) => "get_properties_res",
            Self::GetParameters(_) => "get_parameters_res",
            Self::Fit(_) => "fit_res",
            Self::Evaluate(_) => "evaluate_res",
            Self::Disconnect(_) => "disconnect_res",
            Self::Query(_) => "query_res",
        }
    }
}

// Typed extraction of one reply variant; the mismatching reply is handed back.
macro_rules! reply_variant {
    ($variant:ident => $res:ty) => {
        impl TryFrom<Reply> for $res {
            type Error = Reply;

            fn try_from(reply: Reply) -> Result<Self, Self::Error> {
                match reply {
                    Reply::$variant(res) => Ok(res),
                    other => Err(other),
                }
            }
        }

        impl From<$res> for Reply {
            fn from(res: $res) -> Self {
                Reply::$variant(res)
            }
        }
    };
}

reply_variant!(GetProperties => GetPropertiesRes);
reply_variant!(GetParameters => GetParametersRes);
reply_variant!(Fit => FitRes);
reply_variant!(Evaluate => EvaluateRes);
reply_variant!(Disconnect => DisconnectRes);
reply_variant!(Query => QueryRes);

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Instruction(Instruction),
    Reply(Reply),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Instruction(ins) => ins.kind(),
            Self::Reply(res) => res.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub payload: Payload,
    /// Local to the bridge; not transmitted to the worker.
    pub deadline: Option<Duration>,
}

impl Envelope {
    pub fn instruction(instruction: Instruction, deadline: Option<Duration>) -> Self {
        Self {
            payload: Payload::Instruction(instruction),
            deadline,
        }
    }

    pub fn reply(reply: impl Into<Reply>) -> Self {
        Self {
            payload: Payload::Reply(reply.into()),
            deadline: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    /// The instruction inside, or the envelope back if it holds a reply.
    pub fn into_instruction(self) -> Result<Instruction, Self> {
        match self.payload {
            Payload::Instruction(ins) => Ok(ins),
            payload => Err(Self {
                payload,
                deadline: self.deadline,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DisconnectReason, Status};

    #[test]
    fn test_expected_reply_matches_reply_kind() {
        let pairs: Vec<(Instruction, Reply)> = vec![
            (
                Instruction::GetProperties(GetPropertiesIns::default()),
                Reply::GetProperties(GetPropertiesRes::default()),
            ),
            (
                Instruction::GetParameters(GetParametersIns::default()),
                Reply::GetParameters(GetParametersRes::default()),
            ),
            (Instruction::Fit(FitIns::default()), Reply::Fit(FitRes::default())),
            (
                Instruction::Evaluate(EvaluateIns::default()),
                Reply::Evaluate(EvaluateRes::default()),
            ),
            (
                Instruction::Reconnect(ReconnectIns::default()),
                Reply::Disconnect(DisconnectRes::default()),
            ),
            (Instruction::Query(QueryIns::default()), Reply::Query(QueryRes::default())),
        ];

        for (ins, res) in pairs {
            assert_eq!(ins.expected_reply(), res.kind(), "{}", ins.kind());
        }
    }

    #[test]
    fn test_try_from_reply() {
        let reply = Reply::from(FitRes {
            status: Status::ok(),
            num_examples: 32,
            ..Default::default()
        });

        let fit = FitRes::try_from(reply.clone()).unwrap();
        assert_eq!(fit.num_examples, 32);

        let mismatch = EvaluateRes::try_from(reply).unwrap_err();
        assert_eq!(mismatch.kind(), "fit_res");
    }

    #[test]
    fn test_envelope_into_instruction() {
        let env = Envelope::instruction(
            Instruction::Reconnect(ReconnectIns { seconds: Some(5) }),
            Some(Duration::from_secs(1)),
        );
        assert_eq!(env.kind(), "reconnect");
        assert!(env.into_instruction().is_ok());

        let env = Envelope::reply(DisconnectRes {
            reason: DisconnectReason::Ack,
        });
        assert_eq!(env.deadline, None);
        let back = env.into_instruction().unwrap_err();
        assert_eq!(back.kind(), "disconnect_res");
    }
}
