//! Bindings for the HM25 sustainable-projects contract.
//!
//! Procedures and functions have separate selector spaces, so `CreateProject` and
//! `GetNumberOfProjects` both use input type 3.

use crate::{
    codec::{CodecError, ContractCall, PayloadReader, PayloadWriter, QueryResponse},
    identity::Identity,
    query::ContractFunction,
};

/// Contract index the HM25 contract is deployed at.
pub const CONTRACT_INDEX: u32 = 12;

/// Amount attached to a project creation transaction.
pub const CREATE_PROJECT_AMOUNT: i64 = 10;

/// Address transactions to the contract are sent to.
#[must_use]
pub fn contract_identity() -> Identity {
    Identity::contract(CONTRACT_INDEX)
}

/// Registers a new project.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CreateProject {
    /// Project title handle.
    pub title: u64,
}

impl ContractCall for CreateProject {
    const INPUT_TYPE: u16 = 3;
    const ABI_SIZE: usize = 8;

    fn encode_fields(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
        writer.put_u64(self.title)
    }

    fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            title: reader.read_u64()?,
        })
    }
}

/// Reads how many projects the contract holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetNumberOfProjects;

impl ContractFunction for GetNumberOfProjects {
    const CONTRACT_INDEX: u32 = CONTRACT_INDEX;
    const INPUT_TYPE: u16 = 3;
    type Response = NumberOfProjects;
}

/// Response of [`GetNumberOfProjects`]; zero until the contract has state.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct NumberOfProjects {
    /// Registered project count.
    pub count: u64,
}

impl QueryResponse for NumberOfProjects {
    const MIN_SIZE: usize = 8;

    fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            count: reader.read_u64()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, decode_response, encode};

    #[test]
    fn create_project_round_trips() {
        let call = CreateProject { title: 3 };
        let payload = encode(&call).expect("encode");
        assert_eq!(payload.as_bytes(), &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(decode::<CreateProject>(payload.as_bytes()), Ok(call));

        let max = CreateProject { title: u64::MAX };
        assert_eq!(
            decode::<CreateProject>(encode(&max).expect("encode").as_bytes()),
            Ok(max)
        );
    }

    #[test]
    fn project_count_defaults_on_short_response() {
        assert_eq!(
            decode_response::<NumberOfProjects>(&[9, 9, 9]),
            Ok(NumberOfProjects::default())
        );
        assert_eq!(
            decode_response::<NumberOfProjects>(&4_u64.to_le_bytes()),
            Ok(NumberOfProjects { count: 4 })
        );
    }

    #[test]
    fn contract_address_is_canonical() {
        assert_eq!(
            contract_identity().to_string(),
            "MAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWLWD"
        );
    }
}
