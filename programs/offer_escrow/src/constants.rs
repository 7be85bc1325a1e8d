/// Size of the account discriminator Anchor prefixes to every account
pub const ANCHOR_DISCRIMINATOR: usize = 8;
