//! Table definitions and the column layout each one must have

/// One required table
pub(crate) struct Table {
    pub name: &'static str,
    pub ddl: &'static str,
    /// `(column_name, information_schema data_type)`
    pub columns: &'static [(&'static str, &'static str)],
}

const BIGINT: &str = "bigint";
const CHAR: &str = "character";
const VARCHAR: &str = "character varying";
const TEXT: &str = "text";
const BOOL: &str = "boolean";
const DATE: &str = "date";
const TIMESTAMPTZ: &str = "timestamp with time zone";
const ARRAY: &str = "ARRAY";

/// In dependency order: referenced tables come first.
pub(crate) const TABLES: &[Table] = &[
    Table {
        name: "auth_user",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_user (
            id BIGSERIAL PRIMARY KEY,
            cpf CHAR(11) NOT NULL UNIQUE,
            password CHAR(60) NOT NULL,
            display_name VARCHAR(255) NOT NULL,
            phone VARCHAR(32),
            email VARCHAR(255) UNIQUE,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            last_login TIMESTAMPTZ,
            verified_at TIMESTAMPTZ,
            deactivated_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ
        )
        "#,
        columns: &[
            ("id", BIGINT),
            ("cpf", CHAR),
            ("password", CHAR),
            ("display_name", VARCHAR),
            ("phone", VARCHAR),
            ("email", VARCHAR),
            ("is_active", BOOL),
            ("last_login", TIMESTAMPTZ),
            ("verified_at", TIMESTAMPTZ),
            ("deactivated_at", TIMESTAMPTZ),
            ("created_at", TIMESTAMPTZ),
            ("updated_at", TIMESTAMPTZ),
        ],
    },
    Table {
        name: "auth_group",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_group (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(32) NOT NULL UNIQUE
        )
        "#,
        columns: &[("id", BIGINT), ("name", VARCHAR)],
    },
    Table {
        name: "auth_permission",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_permission (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            codename VARCHAR(100) NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        )
        "#,
        columns: &[
            ("id", BIGINT),
            ("name", VARCHAR),
            ("codename", VARCHAR),
            ("description", TEXT),
        ],
    },
    Table {
        name: "auth_user_groups",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_user_groups (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
            group_id BIGINT NOT NULL REFERENCES auth_group(id) ON DELETE RESTRICT,
            UNIQUE (user_id, group_id)
        )
        "#,
        columns: &[("id", BIGINT), ("user_id", BIGINT), ("group_id", BIGINT)],
    },
    Table {
        name: "auth_group_permissions",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_group_permissions (
            id BIGSERIAL PRIMARY KEY,
            group_id BIGINT NOT NULL REFERENCES auth_group(id) ON DELETE CASCADE,
            permission_id BIGINT NOT NULL REFERENCES auth_permission(id) ON DELETE CASCADE,
            UNIQUE (group_id, permission_id)
        )
        "#,
        columns: &[("id", BIGINT), ("group_id", BIGINT), ("permission_id", BIGINT)],
    },
    Table {
        name: "auth_session",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS auth_session (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES auth_user(id) ON DELETE CASCADE,
            token CHAR(128) NOT NULL UNIQUE,
            last_access TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            expire_date TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ
        )
        "#,
        columns: &[
            ("id", BIGINT),
            ("user_id", BIGINT),
            ("token", CHAR),
            ("last_access", TIMESTAMPTZ),
            ("expire_date", TIMESTAMPTZ),
            ("created_at", TIMESTAMPTZ),
            ("updated_at", TIMESTAMPTZ),
        ],
    },
    Table {
        name: "forms_patient_information",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS forms_patient_information (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL UNIQUE REFERENCES auth_user(id) ON DELETE RESTRICT,
            gender VARCHAR(16) NOT NULL CHECK (gender IN ('Masculino', 'Feminino')),
            birthday DATE NOT NULL,
            acquaintance_phone VARCHAR(32) NOT NULL,
            address VARCHAR(255) NOT NULL,
            neighborhood VARCHAR(255) NOT NULL,
            city VARCHAR(255) NOT NULL,
            country VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ
        )
        "#,
        columns: &[
            ("id", BIGINT),
            ("user_id", BIGINT),
            ("gender", VARCHAR),
            ("birthday", DATE),
            ("acquaintance_phone", VARCHAR),
            ("address", VARCHAR),
            ("neighborhood", VARCHAR),
            ("city", VARCHAR),
            ("country", VARCHAR),
            ("created_at", TIMESTAMPTZ),
            ("updated_at", TIMESTAMPTZ),
        ],
    },
    Table {
        name: "forms_sociodemographic_evaluation",
        ddl: r#"
        CREATE TABLE IF NOT EXISTS forms_sociodemographic_evaluation (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES auth_user(id) ON DELETE RESTRICT,
            civil_status VARCHAR(32) NOT NULL,
            lives_with_status VARCHAR(32) NOT NULL,
            education VARCHAR(32) NOT NULL,
            occupational_status VARCHAR(64) NOT NULL,
            current_job VARCHAR(255),
            last_job VARCHAR(255),
            is_sick BOOLEAN NOT NULL,
            diseases TEXT[] CHECK (cardinality(diseases) > 0),
            is_medicated BOOLEAN NOT NULL,
            medicines TEXT[] CHECK (cardinality(medicines) > 0),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ
        )
        "#,
        columns: &[
            ("id", BIGINT),
            ("user_id", BIGINT),
            ("civil_status", VARCHAR),
            ("lives_with_status", VARCHAR),
            ("education", VARCHAR),
            ("occupational_status", VARCHAR),
            ("current_job", VARCHAR),
            ("last_job", VARCHAR),
            ("is_sick", BOOL),
            ("diseases", ARRAY),
            ("is_medicated", BOOL),
            ("medicines", ARRAY),
            ("created_at", TIMESTAMPTZ),
            ("updated_at", TIMESTAMPTZ),
        ],
    },
];

pub(crate) const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_auth_user_groups_group ON auth_user_groups(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_auth_group_permissions_permission ON auth_group_permissions(permission_id)",
    "CREATE INDEX IF NOT EXISTS idx_auth_session_user ON auth_session(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_auth_user_display_name ON auth_user(display_name)",
    "CREATE INDEX IF NOT EXISTS idx_forms_sociodemographic_user ON forms_sociodemographic_evaluation(user_id)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_lists_its_id() {
        for table in TABLES {
            assert_eq!(table.columns[0], ("id", BIGINT), "{}", table.name);
            assert!(table.ddl.contains(table.name));
        }
    }

    #[test]
    fn every_form_references_a_user() {
        for table in TABLES.iter().filter(|t| t.name.starts_with("forms_")) {
            assert!(table.ddl.contains("REFERENCES auth_user(id) ON DELETE RESTRICT"), "{}", table.name);
            assert!(table.columns.contains(&("user_id", BIGINT)), "{}", table.name);
        }
    }

    #[test]
    fn referenced_tables_come_first() {
        let position = |name: &str| TABLES.iter().position(|t| t.name == name).unwrap();
        for (i, table) in TABLES.iter().enumerate() {
            for other in TABLES {
                if table.ddl.contains(&format!("REFERENCES {}(", other.name)) {
                    assert!(position(other.name) < i, "{} before {}", other.name, table.name);
                }
            }
        }
    }
}
