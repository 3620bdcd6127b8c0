use anyhow::Result;

use crate::schema::Schema;

pub fn run() -> Result<()> {
    print!("{}", Schema::template_json());
    Ok(())
}
