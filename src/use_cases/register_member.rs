use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Member;
use crate::error::EngineError;
use crate::ports::MemberRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMemberInput {
    pub group_id: Uuid,
    pub name: String,
    pub phone: String,
}

pub struct RegisterMember {
    members: Arc<dyn MemberRepository>,
}

impl RegisterMember {
    pub fn new(members: Arc<dyn MemberRepository>) -> Self {
        Self { members }
    }

    pub async fn execute(&self, input: RegisterMemberInput) -> Result<Member, EngineError> {
        let member = Member::new(input.group_id, &input.name, &input.phone)?;
        let member = self.members.insert(&member).await?;

        tracing::info!(member_id = %member.id, group_id = %member.group_id, "Member registered");
        Ok(member)
    }

    pub async fn get(&self, member_id: Uuid) -> Result<Member, EngineError> {
        Ok(self.members.get_by_id(member_id).await?)
    }
}
