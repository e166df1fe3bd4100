use anyhow::Result;

use crate::config::TeacherType;
use crate::teachers::{
    DoubleTeacher, FixedPercWrongTeacher, SingleBatchTeacher, Teacher, WtfTeacher,
};

/// Build a boxed teacher from its registry entry.
pub fn build_teacher(teacher_type: TeacherType) -> Result<Box<dyn Teacher>> {
    let teacher: Box<dyn Teacher> = match teacher_type {
        TeacherType::SingleBatch(params) => Box::new(SingleBatchTeacher::new(params)),
        TeacherType::Double(params) => Box::new(DoubleTeacher::new(params)),
        TeacherType::FixedPercWrong(params) => Box::new(FixedPercWrongTeacher::new(params)),
        TeacherType::Wtf(params) => Box::new(WtfTeacher::new(params)?),
    };
    Ok(teacher)
}
