//! Prepared-statement bookkeeping and bind-and-substitute.

use std::collections::HashMap;

use super::constant::{ParamFlags, ParamType};
use super::primitive::{read_int_1, read_int_4};
use super::value::{resolve_param_type, Value};
use crate::error::{Error, Result};

/// A server-acknowledged (or tentatively parked) prepared statement.
#[derive(Debug, Clone)]
pub struct Statement {
    pub id: u32,
    pub sql_text: String,
    pub field_count: u16,
    pub param_count: usize,
    /// Values bound by the most recent EXECUTE that carried a
    /// new-params-bound section. Persisted so a later EXECUTE that reuses
    /// the flag-0 "no new params" path still has values to substitute
    /// (`original_source/mysql/stmt.go`'s `Args`).
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(id: u32, sql_text: String, field_count: u16, param_count: usize) -> Self {
        Self {
            id,
            sql_text,
            field_count,
            param_count,
            args: Vec::new(),
        }
    }

    /// Substitute `?` placeholders left-to-right with the given bound
    /// values' SQL literal rendering.
    pub fn bind(&self, values: &[Value]) -> String {
        let mut out = String::with_capacity(self.sql_text.len());
        let mut values = values.iter();
        for ch in self.sql_text.chars() {
            if ch == '?' {
                if let Some(v) = values.next() {
                    out.push_str(&v.to_sql_literal());
                    continue;
                }
            }
            out.push(ch);
        }
        out
    }
}

/// Per-flow `stmt_id → Statement` table. Id `0` is the sentinel "parked"
/// slot used when a PREPARE's reply was never correlated (spec §9).
#[derive(Debug, Default)]
pub struct StmtMap {
    statements: HashMap<u32, Statement>,
}

impl StmtMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u32, statement: Statement) {
        self.statements.insert(id, statement);
    }

    pub fn get(&self, id: u32) -> Option<&Statement> {
        self.statements.get(&id)
    }

    pub fn remove(&mut self, id: u32) {
        self.statements.remove(&id);
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Statement> {
        self.statements.get_mut(&id)
    }
}

/// Decode and bind the parameters of a `COM_STMT_EXECUTE` payload (the
/// command byte itself already stripped) against `statement`, per spec
/// §4.2 steps 2-4. Returns the rendered SQL text.
pub fn execute_and_render(payload: &[u8], statement: &mut Statement) -> Result<String> {
    let param_count = statement.param_count;
    if param_count == 0 {
        return Ok(statement.sql_text.clone());
    }

    // flags + iteration-count, 4 bytes total (spec §4.2 step 2).
    if payload.len() < 4 {
        return Err(Error::MalformedExecute("truncated flags/iteration-count"));
    }
    let rest = &payload[4..];

    let bitmap_len = (param_count + 7) / 8;
    if rest.len() < bitmap_len {
        return Err(Error::MalformedExecute("truncated null bitmap"));
    }
    let null_bitmap = &rest[..bitmap_len];
    let rest = &rest[bitmap_len..];

    let (new_params_bound, mut rest) = read_int_1(rest)?;
    if new_params_bound != 0x01 {
        // Reuse the args bound by the last EXECUTE that did carry a
        // type/value section (original_source/mysql/mysql.go:338).
        return Ok(statement.bind(&statement.args));
    }

    let mut types = Vec::with_capacity(param_count);
    for _ in 0..param_count {
        if rest.len() < 2 {
            return Err(Error::MalformedExecute("truncated paramTypes"));
        }
        let (type_byte, after_type) = read_int_1(rest)?;
        let (flag_byte, after_flag) = read_int_1(after_type)?;
        let ty = resolve_param_type(type_byte)?;
        let flags = ParamFlags::from_bits_truncate(flag_byte);
        types.push((ty, flags));
        rest = after_flag;
    }

    let mut values = Vec::with_capacity(param_count);
    for (i, (ty, flags)) in types.into_iter().enumerate() {
        let is_null = (null_bitmap[i / 8] & (1 << (i % 8))) != 0;
        if is_null {
            values.push(Value::Null);
            continue;
        }
        let (value, remaining) = Value::parse(rest, ty, flags)?;
        values.push(value);
        rest = remaining;
    }

    statement.args = values;
    Ok(statement.bind(&statement.args))
}

/// Read the `stmt_id` prefix of a `COM_STMT_EXECUTE` payload (command byte
/// already stripped), returning it plus the remaining bytes.
pub fn read_stmt_id(payload: &[u8]) -> Result<(u32, &[u8])> {
    read_int_4(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_param_execute_emits_original_sql() {
        let mut stmt = Statement::new(1, "SELECT 1".to_string(), 0, 0);
        let sql = execute_and_render(&[], &mut stmt).unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn binds_unsigned_long_and_var_string() {
        let mut stmt = Statement::new(1, "INSERT INTO t(a,b) VALUES(?,?)".to_string(), 0, 2);

        let mut payload = Vec::new();
        payload.extend_from_slice(&[0u8; 4]); // flags + iteration-count
        payload.push(0x00); // null_bitmap (1 byte for 2 params)
        payload.push(0x01); // new-params-bound
        payload.push(ParamType::Long as u8);
        payload.push(ParamFlags::UNSIGNED.bits());
        payload.push(ParamType::VarString as u8);
        payload.push(0x00);
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.push(3);
        payload.extend_from_slice(b"abc");

        let sql = execute_and_render(&payload, &mut stmt).unwrap();
        assert_eq!(sql, "INSERT INTO t(a,b) VALUES(42,'abc')");
    }

    #[test]
    fn null_bitmap_bit_skips_value_bytes() {
        let mut stmt = Statement::new(1, "INSERT INTO t(a) VALUES(?)".to_string(), 0, 1);

        let mut payload = Vec::new();
        payload.extend_from_slice(&[0u8; 4]); // flags + iteration-count
        payload.push(0x01); // null bitmap bit 0 set
        payload.push(0x01); // new-params-bound
        payload.push(ParamType::Long as u8);
        payload.push(0x00);

        let sql = execute_and_render(&payload, &mut stmt).unwrap();
        assert_eq!(sql, "INSERT INTO t(a) VALUES(NULL)");
    }

    #[test]
    fn reexecute_with_no_new_params_reuses_persisted_args() {
        let mut stmt = Statement::new(1, "INSERT INTO t(a,b) VALUES(?,?)".to_string(), 0, 2);

        let mut first = Vec::new();
        first.extend_from_slice(&[0u8; 4]);
        first.push(0x00);
        first.push(0x01); // new-params-bound
        first.push(ParamType::Long as u8);
        first.push(ParamFlags::UNSIGNED.bits());
        first.push(ParamType::VarString as u8);
        first.push(0x00);
        first.extend_from_slice(&42u32.to_le_bytes());
        first.push(3);
        first.extend_from_slice(b"abc");
        let sql = execute_and_render(&first, &mut stmt).unwrap();
        assert_eq!(sql, "INSERT INTO t(a,b) VALUES(42,'abc')");

        let mut second = Vec::new();
        second.extend_from_slice(&[0u8; 4]);
        second.push(0x00);
        second.push(0x00); // no new params bound; reuse stmt.args
        let sql = execute_and_render(&second, &mut stmt).unwrap();
        assert_eq!(sql, "INSERT INTO t(a,b) VALUES(42,'abc')");
    }
}
