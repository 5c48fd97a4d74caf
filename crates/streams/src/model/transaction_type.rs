//! Transaction type derived from a transaction body.

use std::fmt;

use crate::proto::{transaction_body::Data, TransactionBody};

/// Kind of a transaction, keyed by the body's protobuf field number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransactionType {
    CryptoCreateAccount,
    CryptoDelete,
    CryptoTransfer,
    CryptoUpdateAccount,
    Freeze,
    ConsensusCreateTopic,
    ConsensusUpdateTopic,
    ConsensusDeleteTopic,
    ConsensusSubmitMessage,
    TokenCreation,
    TokenMint,
    TokenBurn,
    /// Body with no recognised data field.
    Unknown,
}

impl TransactionType {
    /// Classifies a decoded transaction body.
    pub fn of(body: &TransactionBody) -> Self {
        match &body.data {
            Some(Data::CryptoCreateAccount(_)) => TransactionType::CryptoCreateAccount,
            Some(Data::CryptoDelete(_)) => TransactionType::CryptoDelete,
            Some(Data::CryptoTransfer(_)) => TransactionType::CryptoTransfer,
            Some(Data::CryptoUpdateAccount(_)) => TransactionType::CryptoUpdateAccount,
            Some(Data::Freeze(_)) => TransactionType::Freeze,
            Some(Data::ConsensusCreateTopic(_)) => TransactionType::ConsensusCreateTopic,
            Some(Data::ConsensusUpdateTopic(_)) => TransactionType::ConsensusUpdateTopic,
            Some(Data::ConsensusDeleteTopic(_)) => TransactionType::ConsensusDeleteTopic,
            Some(Data::ConsensusSubmitMessage(_)) => TransactionType::ConsensusSubmitMessage,
            Some(Data::TokenCreation(_)) => TransactionType::TokenCreation,
            Some(Data::TokenMint(_)) => TransactionType::TokenMint,
            Some(Data::TokenBurn(_)) => TransactionType::TokenBurn,
            None => TransactionType::Unknown,
        }
    }

    /// Stored numeric id (the body field number, `-1` when unknown).
    pub fn proto_id(&self) -> i32 {
        match self {
            TransactionType::CryptoCreateAccount => 11,
            TransactionType::CryptoDelete => 12,
            TransactionType::CryptoTransfer => 14,
            TransactionType::CryptoUpdateAccount => 15,
            TransactionType::Freeze => 23,
            TransactionType::ConsensusCreateTopic => 24,
            TransactionType::ConsensusUpdateTopic => 25,
            TransactionType::ConsensusDeleteTopic => 26,
            TransactionType::ConsensusSubmitMessage => 27,
            TransactionType::TokenCreation => 29,
            TransactionType::TokenMint => 37,
            TransactionType::TokenBurn => 38,
            TransactionType::Unknown => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CryptoCreateAccount => "CRYPTOCREATEACCOUNT",
            TransactionType::CryptoDelete => "CRYPTODELETE",
            TransactionType::CryptoTransfer => "CRYPTOTRANSFER",
            TransactionType::CryptoUpdateAccount => "CRYPTOUPDATEACCOUNT",
            TransactionType::Freeze => "FREEZE",
            TransactionType::ConsensusCreateTopic => "CONSENSUSCREATETOPIC",
            TransactionType::ConsensusUpdateTopic => "CONSENSUSUPDATETOPIC",
            TransactionType::ConsensusDeleteTopic => "CONSENSUSDELETETOPIC",
            TransactionType::ConsensusSubmitMessage => "CONSENSUSSUBMITMESSAGE",
            TransactionType::TokenCreation => "TOKENCREATION",
            TransactionType::TokenMint => "TOKENMINT",
            TransactionType::TokenBurn => "TOKENBURN",
            TransactionType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::CryptoTransferTransactionBody;

    #[test]
    fn test_classify_body() {
        let body = TransactionBody {
            data: Some(Data::CryptoTransfer(CryptoTransferTransactionBody::default())),
            ..Default::default()
        };
        assert_eq!(TransactionType::of(&body), TransactionType::CryptoTransfer);
        assert_eq!(TransactionType::of(&body).proto_id(), 14);
        assert_eq!(
            TransactionType::of(&TransactionBody::default()),
            TransactionType::Unknown
        );
    }
}
