pub mod sys_null;
