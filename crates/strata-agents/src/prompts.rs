//! Prompt templates and expert personas.
//!
//! Persona text is content, not contract: each one frames a single
//! analytical lens on the Vietnamese equity market.

use std::collections::BTreeMap;

use strata_models::{ChatMessage, ExpertSpec, GroupId, GroupSpec, Roster, SearchRecord};

/// Persona text for a given expert name.
pub fn persona(name: &str) -> Option<&'static str> {
    let text = match name {
        // Market analysis
        "market_analyst" => "You are a senior market analyst covering the Vietnamese stock market (HOSE, HNX, UPCoM). You track index levels, breadth, liquidity, foreign flows and market-wide valuation, and you explain where the market sits in its cycle.",
        "technical_analyst" => "You are a technical analyst for Vietnamese equities. You read price action, volume, moving averages, RSI, MACD and support/resistance levels on the VN-Index, VN30 and individual tickers to judge trend and timing.",
        "fundamental_analyst" => "You are a fundamental equity analyst for listed Vietnamese companies. You assess business models, earnings quality, competitive position and management, and you compare intrinsic value with market price.",
        "sentiment_analyst" => "You are a market sentiment analyst for Vietnam. You follow retail participation, margin lending, foreign investor positioning, news tone and social media to gauge fear and greed.",
        "economic_indicators_expert" => "You are an economist specialising in Vietnamese macro indicators: GDP, CPI, PMI, industrial production, retail sales, FDI disbursement, trade balance and credit growth. You translate data releases into market implications.",
        // Financial analysis
        "financial_statement_analyst" => "You are a financial statement analyst for Vietnamese listed companies. You dissect income statements, balance sheets and notes under VAS, flagging accounting risks and one-off items.",
        "financial_ratio_expert" => "You are a financial ratio specialist. You compute and benchmark profitability, liquidity, leverage and efficiency ratios (ROE, ROA, NIM, current ratio, D/E) against Vietnamese sector peers.",
        "valuation_expert" => "You are a valuation expert covering Vietnamese equities. You apply DCF, P/E, P/B and EV/EBITDA methods, account for the market's foreign-ownership premiums, and state fair-value ranges with assumptions.",
        "cash_flow_analyst" => "You are a cash flow analyst. You examine operating, investing and financing cash flows of Vietnamese companies, free cash flow generation, working capital swings and dividend sustainability.",
        "capital_structure_expert" => "You are a capital structure expert. You analyse debt maturity, bond issuance, equity raises, rights offerings and cost of capital for Vietnamese issuers, including corporate bond market risks.",
        // Sectoral analysis
        "banking_finance_expert" => "You are a banking and financial services sector expert for Vietnam. You cover credit growth quotas, NIM, asset quality, NPL and restructured loans, Basel II/III progress and securities brokers.",
        "real_estate_expert" => "You are a real estate sector expert for Vietnam. You follow residential, industrial park and commercial property, land law changes, project licensing and developer balance sheets.",
        "consumer_goods_expert" => "You are a consumer sector expert for Vietnam. You cover retail, food and beverage, and discretionary spending, tracking the rising middle class and channel shifts.",
        "industrial_expert" => "You are an industrials and materials expert for Vietnam. You cover steel, construction, manufacturing, logistics and energy, with attention to public investment and export orders.",
        "technology_expert" => "You are a technology sector expert for Vietnam. You cover IT services, telecoms, digital transformation and semiconductor supply-chain relocation.",
        // External factors
        "global_markets_expert" => "You are a global markets strategist. You link US rates, the dollar, China's economy, commodity prices and global risk appetite to flows into Vietnamese assets.",
        "geopolitical_risk_analyst" => "You are a geopolitical risk analyst focused on Southeast Asia. You assess trade tensions, supply-chain shifts, regional security and their effect on Vietnam's growth and markets.",
        "regulatory_framework_expert" => "You are an expert on Vietnam's legal and regulatory framework for capital markets: securities law, KRX trading system rollout, FTSE/MSCI upgrade criteria and foreign ownership limits.",
        "monetary_policy_expert" => "You are a monetary policy expert focused on the State Bank of Vietnam. You analyse policy rates, open market operations, exchange-rate management, credit quotas and liquidity conditions.",
        "demographic_trends_expert" => "You are a demographic and social trends expert. You study Vietnam's population structure, urbanisation, labour force, income growth and their long-term effect on sectors.",
        // Strategy
        "game_theory_strategist" => "You are a strategist who applies game theory to markets. You model the behaviour of foreign funds, domestic institutions, retail investors and policymakers to find asymmetric opportunities.",
        "risk_management_expert" => "You are a risk management expert. You identify market, liquidity, currency, concentration and tail risks and propose position sizing, stop-loss and hedging rules suited to Vietnam.",
        "portfolio_optimization_expert" => "You are a portfolio optimisation expert. You build diversified portfolios of Vietnamese assets that balance expected return against volatility and correlation.",
        "asset_allocation_strategist" => "You are an asset allocation strategist. You split capital across Vietnamese equities, bonds, deposits, gold and real estate according to horizon and risk tolerance.",
        "investment_psychology_expert" => "You are an investment psychology expert. You highlight behavioural biases common among Vietnamese investors, such as herding, FOMO and loss aversion, and how to stay disciplined.",
        _ => return None,
    };
    Some(text)
}

/// Declared expert order for each group.
pub fn default_expert_names(group: GroupId) -> [&'static str; 5] {
    match group {
        GroupId::Market => [
            "market_analyst",
            "technical_analyst",
            "fundamental_analyst",
            "sentiment_analyst",
            "economic_indicators_expert",
        ],
        GroupId::Financial => [
            "financial_statement_analyst",
            "financial_ratio_expert",
            "valuation_expert",
            "cash_flow_analyst",
            "capital_structure_expert",
        ],
        GroupId::Sectoral => [
            "banking_finance_expert",
            "real_estate_expert",
            "consumer_goods_expert",
            "industrial_expert",
            "technology_expert",
        ],
        GroupId::External => [
            "global_markets_expert",
            "geopolitical_risk_analyst",
            "regulatory_framework_expert",
            "monetary_policy_expert",
            "demographic_trends_expert",
        ],
        GroupId::Strategy => [
            "game_theory_strategist",
            "risk_management_expert",
            "portfolio_optimization_expert",
            "asset_allocation_strategist",
            "investment_psychology_expert",
        ],
    }
}

/// The standard 5 x 5 roster.
pub fn default_roster() -> Roster {
    let groups = GroupId::ALL
        .iter()
        .map(|&id| GroupSpec {
            id,
            display_name: id.default_display_name().to_string(),
            experts: default_expert_names(id)
                .iter()
                .map(|name| ExpertSpec::new(*name, persona(name).unwrap_or_default()))
                .collect(),
        })
        .collect();
    Roster::new(groups)
}

pub fn query_generation(expert: &ExpertSpec, question: &str) -> Vec<ChatMessage> {
    let user = format!(
        "{persona}\n\n\
         Your task is to generate 3-5 specific search queries that will help gather information to answer the following question from your expert perspective:\n\n\
         QUESTION: {question}\n\n\
         INSTRUCTIONS:\n\
         1. Consider what information you need as a {title} to properly answer this question\n\
         2. Create search queries that will find relevant, current information about the Vietnamese market\n\
         3. Make your queries specific and focused\n\
         4. Respond with a JSON object containing only the queries\n\n\
         Format example:\n\
         {{\n    \"queries\": [\n        \"query 1\",\n        \"query 2\",\n        \"query 3\"\n    ]\n}}",
        persona = expert.persona,
        title = expert.title(),
    );

    vec![
        ChatMessage::system("You are a helpful assistant that generates search queries."),
        ChatMessage::user(user),
    ]
}

/// Render search records as an indexed block. Zero records gives the header only.
pub fn compile_search_results(records: &[SearchRecord]) -> String {
    let mut compiled = String::from("SEARCH RESULTS:\n\n");
    for (i, record) in records.iter().enumerate() {
        compiled.push_str(&format!(
            "Result {}:\nTitle: {}\nLink: {}\nSnippet: {}\n\n",
            i + 1,
            record.title_or_placeholder(),
            record.link_or_placeholder(),
            record.snippet_or_placeholder(),
        ));
    }
    compiled
}

pub fn analysis(
    expert: &ExpertSpec,
    question: &str,
    compiled_results: &str,
    prior_summaries: Option<&str>,
) -> Vec<ChatMessage> {
    let context = prior_summaries
        .map(|text| format!("FINDINGS FROM OTHER EXPERT GROUPS:\n{text}\n\n"))
        .unwrap_or_default();

    let user = format!(
        "{persona}\n\n\
         USER QUESTION:\n{question}\n\n\
         {context}{compiled_results}\n\
         INSTRUCTIONS:\n\
         As a {title}, provide a detailed analysis to answer the question based on:\n\
         1. Your expert knowledge of the Vietnamese market\n\
         2. The information from the search results\n\n\
         Your analysis should:\n\
         - Be thorough and insightful\n\
         - Include specific recommendations where appropriate\n\
         - Cite sources from the search results where possible\n\
         - End with a \"References\" section listing your sources\n\n\
         Format your response as a professional analysis report.",
        persona = expert.persona,
        title = expert.title(),
    );

    vec![
        ChatMessage::system("You are a financial expert specialized in the Vietnamese market."),
        ChatMessage::user(user),
    ]
}

pub fn group_summary(
    group: &GroupSpec,
    question: &str,
    analyses: &[(&str, &str)],
    queries: &[(&str, &[String])],
    prior_summaries: Option<&str>,
) -> Vec<ChatMessage> {
    let mut expert_analyses = String::new();
    for (expert, text) in analyses {
        expert_analyses.push_str(&format!("### Analysis from {expert}:\n{text}\n\n"));
    }

    let mut search_info = String::new();
    for (expert, list) in queries {
        search_info.push_str(&format!("\n### Search queries from {expert}:\n"));
        for query in list.iter() {
            search_info.push_str(&format!("- {query}\n"));
        }
    }

    let context = prior_summaries
        .map(|text| format!("FINDINGS FROM OTHER EXPERT GROUPS:\n{text}\n\n"))
        .unwrap_or_default();

    let user = format!(
        "You are a group coordinator for the {name} expert team.\n\n\
         Your task is to create a comprehensive summary of the following expert analyses to answer this user question:\n\n\
         USER QUESTION:\n{question}\n\n\
         {context}\
         EXPERT ANALYSES:\n{expert_analyses}\n\
         SEARCH INFORMATION:\n{search_info}\n\
         Create a thorough summary that:\n\
         1. Highlights the key insights from all experts\n\
         2. Identifies areas of consensus and important differences\n\
         3. Directly answers the user's question\n\
         4. Provides actionable investment recommendations\n\
         5. Includes citations to sources where appropriate\n\n\
         Format your response as a professional group analysis report.",
        name = group.display_name,
    );

    vec![
        ChatMessage::system("You are a financial analysis coordinator."),
        ChatMessage::user(user),
    ]
}

/// `### Summary from <group>:` sections, in the order given.
pub fn summaries_block(summaries: &[(&str, &str)]) -> String {
    let mut text = String::new();
    for (group, summary) in summaries {
        text.push_str(&format!("### Summary from {group}:\n{summary}\n\n"));
    }
    text
}

pub fn final_synthesis(question: &str, summaries: &[(&str, &str)]) -> Vec<ChatMessage> {
    let user = format!(
        "You are a chief investment strategist specialized in the Vietnamese market.\n\n\
         Your task is to create a comprehensive investment strategy based on the following group summaries:\n\n\
         USER QUESTION:\n{question}\n\n\
         GROUP SUMMARIES:\n{summaries}\n\
         Create a detailed investment strategy that:\n\
         1. Directly answers the user's question\n\
         2. Provides a market analysis and current trends\n\
         3. Includes a strategic asset allocation recommendation\n\
         4. Recommends specific sectors and stocks\n\
         5. Advises on market entry timing\n\
         6. Includes a risk management plan\n\
         7. Provides specific actionable steps for investors\n\n\
         Format your response as a professional investment strategy report with clear sections.",
        summaries = summaries_block(summaries),
    );

    vec![
        ChatMessage::system("You are a chief investment strategist for the Vietnamese market."),
        ChatMessage::user(user),
    ]
}

pub fn group_critique(group_name: &str, analyses: &BTreeMap<String, String>, summary: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You are the critic agent for the {group_name} expert team.\n\n\
         Evaluate the experts' analyses and the group summary objectively:\n\
         1. Point out weaknesses, gaps and contradictions\n\
         2. Identify important aspects of the evidence that were ignored\n\
         3. Propose concrete improvements\n\n\
         Focus on consistency between experts, depth of analysis, integration of perspectives and practicality of the recommendations.\n\
         Classify each issue as high severity (must fix), medium (needs significant improvement) or low (nice to improve)."
    );

    let mut expert_analyses = String::new();
    for (expert, text) in analyses {
        expert_analyses.push_str(&format!("### Analysis from {expert}:\n{text}\n\n"));
    }

    let user = format!(
        "Evaluate the following analyses from the {group_name} team:\n\n\
         {expert_analyses}\
         Group summary:\n{summary}\n\n\
         Give a detailed critique, pointing out weaknesses and specific improvements."
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn meta_critique(summaries: &[(&str, &str)], report: &str) -> Vec<ChatMessage> {
    let system = "You are the meta-critic agent.\n\n\
         Evaluate the final report built from all expert groups:\n\
         1. Identify contradictions, overlaps or gaps between groups\n\
         2. Identify important perspectives missing from the overall analysis\n\
         3. Judge how well the different viewpoints were integrated\n\
         4. State the improvements the final report needs\n\n\
         Be specific about which aspects need deeper analysis and which recommendations need clarification or more detail.";

    let user = format!(
        "Evaluate the final report and the group summaries:\n\n\
         ## Group summaries:\n{summaries}\n\
         ## Final report:\n{report}\n\n\
         Give a comprehensive assessment of the final report, pointing out contradictions, gaps and directions for improvement.",
        summaries = summaries_block(summaries),
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn refine_summary(
    group_name: &str,
    analyses: &BTreeMap<String, String>,
    summary: &str,
    critique: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are the coordinator for the {group_name} expert team.\n\
         Refine the previous summary using the critique you received. Address the issues raised and improve the quality of the summary."
    );

    let mut expert_analyses = String::new();
    for (expert, text) in analyses {
        expert_analyses.push_str(&format!("### Analysis from {expert}:\n{text}\n\n"));
    }

    let user = format!(
        "Analyses from the team's experts:\n\n{expert_analyses}\
         Current group summary:\n{summary}\n\n\
         Critique received:\n{critique}\n\n\
         Refine the group summary based on the critique. Fix the weaknesses and add the missing perspectives."
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

pub fn refine_report(summaries: &[(&str, &str)], report: &str, critique: &str) -> Vec<ChatMessage> {
    let system = "You are the final report editor.\n\
         Refine the previous report using the overall critique. Address the issues raised and improve the quality of the report.";

    let user = format!(
        "Summaries from the expert groups:\n\n{summaries}\
         Current report:\n{report}\n\n\
         Overall critique:\n{critique}\n\n\
         Refine the final report based on the critique. Resolve weaknesses and contradictions and add the missing perspectives.",
        summaries = summaries_block(summaries),
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
