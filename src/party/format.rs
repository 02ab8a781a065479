//! Chat rendering for parties. Lines stay within 22 characters so they fit a
//! KakaoTalk bubble without wrapping.

use crate::chat::text::truncate;

use super::model::{Party, PartyKind};
use super::registry::{JoinOutcome, LeaveSummary, MemberChange};

const LINE_WIDTH: usize = 22;

pub fn join_help_lines() -> Vec<String> {
    vec![
        String::new(),
        "====참여 방법====".to_string(),
        "/파티참여 ID 직업 본/부".to_string(),
        "예) /참여 3 도적 본 ".to_string(),
    ]
}

/// The party table.
pub fn party_table(party: &Party) -> String {
    let mut lines = vec![
        truncate(&format!("🎮 {} #{}", party.kind.label(), party.id), LINE_WIDTH),
        format!("제목: {}", truncate(&party.title, 18)),
        format!("파티장: {}", truncate(&party.owner_name, 17)),
        format!("인원: {}/{}", party.members.len(), party.capacity),
        format!("시간: {}", party.scheduled_at.format("%H:%M")),
        String::new(),
        "👥 멤버 목록".to_string(),
    ];

    if party.members.is_empty() {
        lines.push("(아직 멤버 없음)".to_string());
        return lines.join("\n");
    }

    lines.push("No | 본/부 | 직업 | 이름".to_string());
    for (idx, member) in party.members.iter().enumerate() {
        let class: String = member
            .class
            .as_deref()
            .unwrap_or("-")
            .replace(' ', "")
            .chars()
            .take(4)
            .collect();
        let name = member.name.replace(' ', "");
        let row = format!("{}) {} | {} | {}", idx + 1, member.role_label(), class, name);
        lines.push(truncate(&row, LINE_WIDTH));
    }
    lines.join("\n")
}

fn with_help(header: &str, party: &Party) -> String {
    let mut lines = vec![header.to_string(), String::new(), party_table(party)];
    lines.extend(join_help_lines());
    lines.join("\n")
}

pub fn created(party: &Party) -> String {
    let header = match party.kind {
        PartyKind::Normal => "🎮 새 파티를 만들었어요!",
        PartyKind::Raid => "⚔️ 레이드 파티를 만들었어요!",
    };
    with_help(header, party)
}

pub fn duplicate(existing: Option<&Party>) -> String {
    match existing {
        Some(party) => with_help("이미 만든 파티가 있어요.", party),
        None => "이미 다른 방에서 만든 파티가 있어요.".to_string(),
    }
}

pub fn party_not_found() -> String {
    let mut lines = vec![
        "해당 ID의 파티가 없어요.".to_string(),
        "현재 파티 목록은 `/파티현황` 으로".to_string(),
        "확인해 주세요.".to_string(),
    ];
    lines.extend(join_help_lines());
    lines.join("\n")
}

/// Reply when a join cannot pick a party on its own.
pub fn ambiguous(parties: &[Party], named: bool) -> String {
    let mut lines = if named {
        vec!["파티가 여러 개 있어요.".to_string(), "ID로 참가하는 걸 권장해요.".to_string()]
    } else {
        let mut lines = vec!["여러 파티가 있어요:".to_string()];
        for party in parties {
            lines.push(format!(
                "- ID:{} [{}] {}",
                party.id,
                party.kind.short_label(),
                party.owner_name
            ));
        }
        lines
    };
    lines.extend(join_help_lines());
    lines.join("\n")
}

pub fn full(party: &Party) -> String {
    format!(
        "🎉 {} 인원이 모두 모였어요!\n({}/{})\n\n{}",
        party.kind.noun(),
        party.capacity,
        party.capacity,
        party_table(party)
    )
}

pub fn join_outcome(outcome: &JoinOutcome) -> String {
    match outcome {
        JoinOutcome::Joined { party, member, .. } => [
            format!("✅ {}에 참가했어요.", party.kind.noun()),
            format!("내 직업: {}", member.class.as_deref().unwrap_or("-")),
            format!("내 포지션: {}", member.role_label()),
            String::new(),
            party_table(party),
        ]
        .join("\n"),
        JoinOutcome::Updated { party, member, change } => {
            let header = match change {
                MemberChange::Class(class) => format!("✅ 직업을 {} 로 수정했어요.", class),
                MemberChange::Role(_) => format!("✅ 포지션을 {} 로 수정했어요.", member.role_label()),
                MemberChange::Unchanged => "이미 같은 정보예요.\n현재 상태를 다시 보여줄게요.".to_string(),
            };
            [
                header,
                String::new(),
                format!("내 포지션: {}", member.role_label()),
                String::new(),
                party_table(party),
            ]
            .join("\n")
        }
    }
}

pub fn already_joined(party: &Party) -> String {
    format!("현재 내 정보를 다시 보여줄게요.\n\n{}", party_table(party))
}

/// Compact list for `/파티현황`.
pub fn status(parties: &[Party]) -> String {
    let mut lines = vec!["📋 현재 파티 현황".to_string()];
    for (idx, party) in parties.iter().enumerate() {
        let members = party.member_names().join(", ");
        lines.push("────────────────".to_string());
        lines.push(format!("#{} [{}]", idx + 1, party.kind.short_label()));
        lines.push(format!("ID:{}", party.id));
        lines.push(format!("장:{}", truncate(&party.owner_name, 10)));
        lines.push(format!("제목:{}", truncate(&party.title, 12)));
        lines.push(format!("인원:{}/{}", party.members.len(), party.capacity));
        lines.push(format!("시간:{}", party.scheduled_at.format("%m/%d %H:%M")));
        lines.push(format!("멤버:{}", truncate(&members, 14)));
    }
    lines.extend(join_help_lines());
    lines.join("\n")
}

pub fn leave_summary(summary: &LeaveSummary) -> String {
    let mut lines = Vec::new();
    if !summary.left.is_empty() {
        lines.push("나간 파티:".to_string());
        lines.extend(summary.left.iter().map(|p| format!("- {}", p.title)));
    }
    if !summary.cancelled.is_empty() {
        lines.push("삭제된 파티:".to_string());
        lines.extend(summary.cancelled.iter().map(|p| format!("- {}", p.title)));
    }
    if lines.is_empty() {
        lines.push("변경된 파티가 없어요.".to_string());
    }
    lines.join("\n")
}

pub fn promotion(party: &Party, requester: Option<&str>) -> String {
    let header = match requester {
        Some(name) => format!("📣 파티 홍보! (요청자: {})", truncate(name, 10)),
        None => "📣 파티 홍보!".to_string(),
    };
    with_help(&header, party)
}

/// Posted when a party's start time arrives.
pub fn start_announcement(party: &Party) -> String {
    let mentions = party
        .members
        .iter()
        .map(|m| format!("@{}", m.name))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "⏰ {} #{} 시작 시간이에요!\n제목: {}\n{}\n\n{}",
        party.kind.noun(),
        party.id,
        truncate(&party.title, 18),
        mentions,
        party_table(party)
    )
}

pub fn help() -> String {
    [
        "📚 [파티 봇 도움말]",
        "",
        "✅ 파티 생성/관리",
        "• /파티 시간 [제목] [직업] [본/부] : 4인 파티 생성",
        "• /레이드파티 시간 [제목] [직업] [본/부] : 8인 파티 생성",
        "  (시간: 21:30 또는 분 단위 숫자)",
        "• /파티삭제 : 내가 만든 파티 삭제",
        "• /파티홍보 : 현재 파티 정보 띄우기",
        "",
        "✅ 참여/탈퇴",
        "• /파티참여 [번호] [직업] [본/부] : 파티 참여",
        "• /파티탈퇴 : 참여 중인 파티 나가기",
        "",
        "✅ 파티장 전용",
        "• /파티멤버추가 [이름] [직업] [본/부] : 멤버 강제 추가",
        "• /파티추방 [번호] : 멤버 내보내기",
        "",
        "✅ 조회",
        "• /파티목록 : 전체 파티 목록 보기",
        "• /파티도움말 : 명령어 목록 보기",
    ]
    .join("\n")
}
