#[cfg(feature = "contract")]
mod contract_impl {
    use freenet_stdlib::prelude::*;
    use provenance_common::snapshot::{
        LedgerDelta, LedgerParameters, LedgerSnapshot, LedgerSummary,
    };

    pub struct Contract;

    fn rejected(e: provenance_common::LedgerError) -> ContractError {
        ContractError::Other(e.to_string())
    }

    fn apply_delta(ledger: &mut LedgerSnapshot, bytes: &[u8]) -> Result<(), ContractError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let delta: LedgerDelta =
            serde_json::from_slice(bytes).map_err(|e| ContractError::Deser(e.to_string()))?;
        ledger.apply_delta(delta).map_err(rejected)?;
        Ok(())
    }

    fn fast_forward(ledger: &mut LedgerSnapshot, bytes: &[u8]) -> Result<(), ContractError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let other: LedgerSnapshot =
            serde_json::from_slice(bytes).map_err(|e| ContractError::Deser(e.to_string()))?;
        ledger.fast_forward(other).map_err(rejected)
    }

    #[contract]
    impl ContractInterface for Contract {
        fn validate_state(
            parameters: Parameters<'static>,
            state: State<'static>,
            _related: RelatedContracts<'static>,
        ) -> Result<ValidateResult, ContractError> {
            let bytes = state.as_ref();
            if bytes.is_empty() {
                return Ok(ValidateResult::Valid);
            }

            let params: LedgerParameters = serde_json::from_slice(parameters.as_ref())
                .map_err(|e| ContractError::Deser(e.to_string()))?;

            let ledger: LedgerSnapshot =
                serde_json::from_slice(bytes).map_err(|e| ContractError::Deser(e.to_string()))?;

            if ledger.administrator() != &params.administrator
                || ledger.verify_signatures().is_err()
                || ledger.verify().is_err()
            {
                return Ok(ValidateResult::Invalid);
            }

            Ok(ValidateResult::Valid)
        }

        fn update_state(
            parameters: Parameters<'static>,
            state: State<'static>,
            data: Vec<UpdateData<'static>>,
        ) -> Result<UpdateModification<'static>, ContractError> {
            let params: LedgerParameters = serde_json::from_slice(parameters.as_ref())
                .map_err(|e| ContractError::Deser(e.to_string()))?;

            let mut ledger: LedgerSnapshot = if state.is_empty() {
                LedgerSnapshot::genesis(params.administrator.clone())
            } else {
                serde_json::from_slice(state.as_ref())
                    .map_err(|e| ContractError::Deser(e.to_string()))?
            };
            if ledger.administrator() != &params.administrator {
                return Err(ContractError::InvalidUpdate);
            }

            for ud in data {
                match ud {
                    UpdateData::State(s) => {
                        fast_forward(&mut ledger, s.as_ref())?;
                    }
                    UpdateData::Delta(d) => {
                        apply_delta(&mut ledger, d.as_ref())?;
                    }
                    UpdateData::StateAndDelta { state, delta } => {
                        fast_forward(&mut ledger, state.as_ref())?;
                        apply_delta(&mut ledger, delta.as_ref())?;
                    }
                    _ => return Err(ContractError::InvalidUpdate),
                }
            }

            let serialized =
                serde_json::to_vec(&ledger).map_err(|e| ContractError::Other(e.to_string()))?;
            Ok(UpdateModification::valid(State::from(serialized)))
        }

        fn summarize_state(
            _parameters: Parameters<'static>,
            state: State<'static>,
        ) -> Result<StateSummary<'static>, ContractError> {
            if state.is_empty() {
                return Ok(StateSummary::from(vec![]));
            }

            let ledger: LedgerSnapshot = serde_json::from_slice(state.as_ref())
                .map_err(|e| ContractError::Deser(e.to_string()))?;

            let summary = ledger.summarize();
            let serialized =
                serde_json::to_vec(&summary).map_err(|e| ContractError::Other(e.to_string()))?;
            Ok(StateSummary::from(serialized))
        }

        fn get_state_delta(
            _parameters: Parameters<'static>,
            state: State<'static>,
            summary: StateSummary<'static>,
        ) -> Result<StateDelta<'static>, ContractError> {
            if state.is_empty() {
                return Ok(StateDelta::from(vec![]));
            }

            let ledger: LedgerSnapshot = serde_json::from_slice(state.as_ref())
                .map_err(|e| ContractError::Deser(e.to_string()))?;

            let summary: LedgerSummary = if summary.is_empty() {
                LedgerSummary::default()
            } else {
                serde_json::from_slice(summary.as_ref())
                    .map_err(|e| ContractError::Deser(e.to_string()))?
            };

            let delta = ledger.delta(&summary);
            let serialized =
                serde_json::to_vec(&delta).map_err(|e| ContractError::Other(e.to_string()))?;
            Ok(StateDelta::from(serialized))
        }
    }

}
