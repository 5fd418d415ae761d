use alloy::primitives::Address;
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::rpc::ReceiptLog;

sol! {
    interface IHMToken {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 value) external returns (bool);
        function transferFrom(address from, address to, uint256 value) external returns (bool);
    }

    interface IEscrowFactory {
        event Launched(address eip20, address escrow);
        function createEscrow(address token, address[] trustedHandlers) external returns (address);
    }

    interface IEscrow {
        function setup(
            address reputationOracle,
            address recordingOracle,
            uint256 reputationOracleStake,
            uint256 recordingOracleStake,
            string url,
            string hash,
            uint256 solutionsRequested
        ) external;
    }
}

/// Finds the escrow announced by `factory` in a `createEscrow` receipt.
pub fn launched_escrow(factory: Address, logs: &[ReceiptLog]) -> Option<Address> {
    logs.iter()
        .filter(|log| log.address == factory)
        .find_map(|log| {
            IEscrowFactory::Launched::decode_raw_log(log.topics.iter().copied(), &log.data)
                .ok()
                .map(|launched| launched.escrow)
        })
}
