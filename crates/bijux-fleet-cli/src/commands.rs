// SPDX-License-Identifier: Apache-2.0

use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum AuditCommand {
    /// Re-walk the hash chain; exits 3 when a record was altered or removed.
    Verify {
        #[arg(long, default_value_t = 0)]
        from: u64,
    },
    Show {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Append a correction that references an earlier record.
    Correct {
        #[arg(long)]
        index: u64,
        #[arg(long)]
        note: String,
    },
}
