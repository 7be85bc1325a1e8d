use anchor_lang::error_code;

#[error_code]
pub enum OfferError {
    #[msg("Offered and wanted amounts must be greater than zero")]
    InvalidAmount,

    #[msg("Offered and wanted mints must differ")]
    SameMint,

    #[msg("Maker does not hold the offered amount")]
    InsufficientOfferedBalance,
}
