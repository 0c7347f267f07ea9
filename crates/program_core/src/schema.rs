//! Select lists shared by every statement that returns programs. Each one
//! yields the columns `Program::from_row` expects.

/// Joined read of programs. Must be followed by [`PROGRAM_GROUP_BY`], which
/// collapses the one-to-many reinsurer join back to one row per program.
pub const PROGRAM_SELECT: &str = "SELECT p.id, p.name, p.category_id, c.name AS category_name, \
     p.intermediary_id, p.loss_ratio, p.gross_premium, p.ceded_premium, p.underwriter, \
     p.status::text AS status, p.created_at, p.updated_at, \
     COUNT(pr.reinsurer_id) AS reinsurer_count \
     FROM programs p \
     LEFT JOIN program_categories c ON c.id = p.category_id \
     LEFT JOIN program_reinsurers pr ON pr.program_id = p.id";

pub const PROGRAM_GROUP_BY: &str = " GROUP BY p.id, c.name";

/// Stable total order for listings; `id` breaks ties between equal names.
pub const PROGRAM_ORDER: &str = " ORDER BY p.name ASC, p.id ASC";

/// Select list over a data-modifying CTE named `p` (`WITH p AS (... RETURNING *)`).
pub const RETURNED_PROGRAM_SELECT: &str = "SELECT p.id, p.name, p.category_id, \
     c.name AS category_name, p.intermediary_id, p.loss_ratio, p.gross_premium, \
     p.ceded_premium, p.underwriter, p.status::text AS status, p.created_at, p.updated_at, \
     (SELECT COUNT(*) FROM program_reinsurers pr WHERE pr.program_id = p.id) AS reinsurer_count \
     FROM p LEFT JOIN program_categories c ON c.id = p.category_id";
