use ethers::prelude::abigen;

// Generates the bindings for the `ZkDisputeGameFactory` contract.
abigen!(
    ZkDisputeGameFactory,
    r"[
        event DisputeGameCreated(address indexed disputeProxy, uint32 indexed gameType, bytes32 indexed rootClaim)
        function createZkFaultDisputeGame(uint32 _gameType, bytes32[] calldata _claims, uint64 _parentGameIndex, uint64 _l2BlockNumber, bytes calldata _extraData) external payable returns (address proxy_)
        function gameCount() external view returns (uint256 gameCount_)
        function gameAtIndex(uint256 _index) external view returns (uint32 gameType_, uint64 timestamp_, address proxy_)
    ]"
);

// Generates the bindings for the `ZkFaultDisputeGame` contract.
abigen!(
    ZkFaultDisputeGame,
    r"[
        function version() external view returns (string)
        function status() external view returns (uint8)
        function claimLen() external view returns (uint256)
        function l1Head() external view returns (bytes32)
        function startingBlockNumber() external view returns (uint256)
        function l2BlockNumber() external view returns (uint256)
        function maxDetectFaultDuration() external view returns (uint64)
        function maxClockDuration() external view returns (uint64)
        function createdAt() external view returns (uint64)
        function rootClaim() external pure returns (bytes32)
        function claimsHash() external view returns (bytes32)
        function challengedClaims(uint256 _index) external view returns (bool)
        function isChallengeSuccess() external view returns (bool)
        function parentGameProxy() external view returns (address)
        function config() external view returns (address)
        function challengerBond() external view returns (uint256)
        function challengeBySignal(uint256 _disputeClaimIndex) external payable
        function resolveClaim() external
        function resolve() external returns (uint8 status_)
    ]",
    methods {
        l1Head() as l1_head;
        l2BlockNumber() as l2_block_number;
    },
);

// Generates the bindings for the `ZkFaultProofConfig` contract.
abigen!(
    ZkFaultProofConfig,
    r"[
        function blockDistance() external view returns (uint256)
    ]"
);
