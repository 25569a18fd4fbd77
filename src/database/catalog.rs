// =============================================================================
// ROUTINE CATALOG - pg_proc scan
// =============================================================================

use anyhow::{Context, Result};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, instrument};

use crate::routines::metadata::{ReturnKind, RoutineMetadata, RoutineParameter, Volatility};

// =============================================================================
// SQL CONSTANTS
// =============================================================================

/// Plain functions in the requested schemas, skipping extension members.
/// Only IN / INOUT / VARIADIC arguments are listed as parameters.
const SCAN_ROUTINES_SQL: &str = r#"
select
    n.nspname::text as schema,
    p.proname::text as name,
    obj_description(p.oid, 'pg_proc') as comment,
    p.provolatile::text as volatility,
    p.proretset as returns_set,
    p.prorettype = 'void'::regtype as returns_void,
    (t.typtype = 'c' or p.prorettype = 'record'::regtype) as returns_record,
    array(
        select coalesce(p.proargnames[a.ord::int], '')
        from unnest(coalesce(p.proallargtypes, p.proargtypes::oid[])) with ordinality as a(typ, ord)
        where coalesce(p.proargmodes[a.ord::int]::text, 'i') in ('i', 'b', 'v')
        order by a.ord
    ) as param_names,
    array(
        select format_type(a.typ, null)
        from unnest(coalesce(p.proallargtypes, p.proargtypes::oid[])) with ordinality as a(typ, ord)
        where coalesce(p.proargmodes[a.ord::int]::text, 'i') in ('i', 'b', 'v')
        order by a.ord
    ) as param_types,
    p.pronargdefaults as default_count
from pg_proc p
join pg_namespace n on n.oid = p.pronamespace
join pg_type t on t.oid = p.prorettype
where p.prokind = 'f'
  and n.nspname::text = any($1)
  and not exists (
      select 1 from pg_depend d
      where d.objid = p.oid and d.classid = 'pg_proc'::regclass and d.deptype = 'e'
  )
order by n.nspname, p.proname
"#;

#[derive(Debug, FromRow)]
struct CatalogRow {
    schema: String,
    name: String,
    comment: Option<String>,
    volatility: String,
    returns_set: bool,
    returns_void: bool,
    returns_record: bool,
    param_names: Vec<String>,
    param_types: Vec<String>,
    default_count: i16,
}

impl From<CatalogRow> for RoutineMetadata {
    fn from(row: CatalogRow) -> Self {
        let total: usize = row.param_types.len();
        let first_default: usize = total.saturating_sub(row.default_count.max(0) as usize);

        let parameters: Vec<RoutineParameter> = row
            .param_types
            .into_iter()
            .enumerate()
            .map(|(index, sql_type)| RoutineParameter {
                name: row.param_names.get(index).cloned().unwrap_or_default(),
                sql_type,
                has_default: index >= first_default,
            })
            .collect();

        let returns: ReturnKind = if row.returns_void {
            ReturnKind::Void
        } else if row.returns_record {
            ReturnKind::Record
        } else {
            ReturnKind::Scalar
        };

        RoutineMetadata {
            schema: row.schema,
            name: row.name,
            parameters,
            comment: row.comment,
            volatility: Volatility::from_catalog(&row.volatility),
            returns,
            returns_set: row.returns_set,
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Reads routine definitions out of the PostgreSQL system catalog
pub struct PgCatalog;

impl PgCatalog {
    /// Scans the given schemas and returns one entry per plain function
    #[instrument(skip(pool))]
    pub async fn scan(pool: &PgPool, schemas: &[String]) -> Result<Vec<RoutineMetadata>> {
        info!("Scanning routine catalog...");

        let rows: Vec<CatalogRow> = sqlx::query_as::<_, CatalogRow>(SCAN_ROUTINES_SQL)
            .bind(schemas)
            .fetch_all(pool)
            .await
            .context("Failed to scan routine catalog")?;

        let routines: Vec<RoutineMetadata> = rows.into_iter().map(RoutineMetadata::from).collect();

        for routine in &routines {
            debug!(schema = %routine.schema, name = %routine.name, "Discovered routine");
        }

        info!("Catalog scan found {} routines", routines.len());
        Ok(routines)
    }
}
