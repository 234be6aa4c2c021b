pub mod exchange {
    alloy::sol! {
        /// Fill event emitted by the CTF exchange contracts when two orders
        /// match. The signature hash is fixed per protocol version; a protocol
        /// upgrade changing the event shape requires re-deriving this
        /// declaration.
        #[derive(Debug)]
        event OrderFilled(
            bytes32 indexed orderHash,
            address indexed maker,
            address indexed taker,
            uint256 makerAssetId,
            uint256 takerAssetId,
            uint256 makerAmountFilled,
            uint256 takerAmountFilled,
            uint256 fee
        );
    }
}
